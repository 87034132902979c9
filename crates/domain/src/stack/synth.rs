//! Stack synthesis - composes the pipeline's resources from configuration

use serde_json::{Value, json};
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;
use thiserror::Error;

use crate::{
    config::{AlertFormat, ConfigError, DeploymentConfig, FunctionSettings, SummarizerProvider},
    model::CrawlRequest,
    stack::template::{Resource, Template, get_att, join, reference, sub},
};

pub const FEED_TABLE: &str = "FeedItemTable";
pub const HISTORY_TABLE: &str = "NotificationHistoryTable";
pub const ALERT_TOPIC: &str = "AlertTopic";
pub const CRAWLER: &str = "CrawlerFunction";
pub const NOTIFIER: &str = "NotifierFunction";
pub const ALERTER: &str = "AlerterFunction";
pub const STREAM_MAPPING: &str = "NotifierStreamMapping";

const RUNTIME: &str = "provided.al2023";
const ERROR_FILTER_PATTERN: &str = r#"{ $.level = "ERROR" }"#;
const BASIC_EXECUTION_POLICY: &str =
    "arn:${AWS::Partition}:iam::aws:policy/service-role/AWSLambdaBasicExecutionRole";
/// Redeliveries of a stream record whose summary failed
const STREAM_RETRY_ATTEMPTS: u32 = 2;
/// Inference profile prefixes that route a model across regions
const CROSS_REGION_PREFIXES: [&str; 5] = ["us.", "eu.", "apac.", "jp.", "global."];

/// Errors that abort synthesis
#[derive(Debug, Error)]
pub enum SynthError {
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("notifier '{notifier}' references parameter '{parameter}' which does not exist")]
    UnresolvedParameter { notifier: String, parameter: String },
    #[error("API key parameter '{0}' does not exist")]
    UnresolvedApiKey(String),
    #[error("stack.artifacts.bucket must name the bucket holding the function bundles")]
    MissingArtifactBucket,
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Names of the secure parameters that exist in the target account
pub trait ParameterCatalog {
    fn contains(&self, name: &str) -> bool;
}

/// Catalog backed by a prefetched set of names
#[derive(Debug, Clone, Default)]
pub struct StaticCatalog {
    names: BTreeSet<String>,
}

impl StaticCatalog {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
        }
    }
}

impl ParameterCatalog for StaticCatalog {
    fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }
}

/// Catalog that resolves every name, used when the check is skipped
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptAllCatalog;

impl ParameterCatalog for AcceptAllCatalog {
    fn contains(&self, _name: &str) -> bool {
        true
    }
}

/// Builds the deployment template for a validated configuration
pub struct StackSynthesizer<'a, P: ParameterCatalog + ?Sized> {
    config: &'a DeploymentConfig,
    catalog: &'a P,
}

impl<'a, P: ParameterCatalog + ?Sized> StackSynthesizer<'a, P> {
    pub fn new(config: &'a DeploymentConfig, catalog: &'a P) -> Self {
        Self { config, catalog }
    }

    /// Validate the configuration and compose the template
    pub fn synthesize(&self) -> Result<Template, SynthError> {
        self.config.validate()?;
        if self.config.stack.artifacts.bucket.trim().is_empty() {
            return Err(SynthError::MissingArtifactBucket);
        }
        self.check_parameters()?;

        let mut template = Template::new(self.config.stack.description.clone());

        self.add_tables(&mut template);
        self.add_alert_topic(&mut template);
        self.add_roles(&mut template);
        self.add_functions(&mut template)?;
        self.add_schedules(&mut template)?;
        self.add_stream_mapping(&mut template);
        self.add_log_subscriptions(&mut template);
        self.add_outputs(&mut template);

        tracing::debug!(resources = template.resources.len(), "Synthesized template");
        Ok(template)
    }

    fn check_parameters(&self) -> Result<(), SynthError> {
        for (name, notifier) in &self.config.notifiers {
            for destination in &notifier.destinations {
                let parameter = destination.parameter_name();
                if !self.catalog.contains(parameter) {
                    return Err(SynthError::UnresolvedParameter {
                        notifier: name.clone(),
                        parameter: parameter.to_string(),
                    });
                }
            }
        }
        if let Some(parameter) = self.config.api_key_parameter() {
            if !self.catalog.contains(parameter) {
                return Err(SynthError::UnresolvedApiKey(parameter.to_string()));
            }
        }
        Ok(())
    }

    fn add_tables(&self, template: &mut Template) {
        template.add(FEED_TABLE, table(Some("NEW_IMAGE")));
        template.add(HISTORY_TABLE, table(None));
    }

    fn add_alert_topic(&self, template: &mut Template) {
        template.add(
            ALERT_TOPIC,
            Resource::new(
                "AWS::SNS::Topic",
                json!({ "DisplayName": "Pipeline error alerts" }),
            ),
        );

        for (index, email) in self.config.stack.alert_emails.iter().enumerate() {
            template.add(
                format!("AlertTopicEmailSubscription{}", index),
                Resource::new(
                    "AWS::SNS::Subscription",
                    json!({
                        "Protocol": "email",
                        "Endpoint": email,
                        "TopicArn": reference(ALERT_TOPIC),
                    }),
                ),
            );
        }
    }

    fn add_roles(&self, template: &mut Template) {
        let crawler_statements = vec![statement(
            &["dynamodb:PutItem"],
            vec![get_att(FEED_TABLE, "Arn")],
        )];

        let mut notifier_statements = vec![
            statement(
                &[
                    "dynamodb:DescribeStream",
                    "dynamodb:GetRecords",
                    "dynamodb:GetShardIterator",
                    "dynamodb:ListStreams",
                ],
                vec![get_att(FEED_TABLE, "StreamArn")],
            ),
            statement(
                &["dynamodb:GetItem", "dynamodb:PutItem"],
                vec![get_att(HISTORY_TABLE, "Arn")],
            ),
        ];
        if self.config.summarizer_provider == SummarizerProvider::Bedrock {
            notifier_statements.push(statement(&["bedrock:InvokeModel"], self.model_arns()));
        }
        let mut parameters = self.config.referenced_parameters();
        parameters.extend(self.config.api_key_parameter().map(str::to_string));
        if !parameters.is_empty() {
            notifier_statements.push(statement(
                &["ssm:GetParameter"],
                parameters.iter().map(|name| parameter_arn(name)).collect(),
            ));
        }
        if self.config.has_topic_destinations() {
            // Topic ARNs live in parameters and are unknown here
            notifier_statements.push(statement(&["sns:Publish"], vec![json!("*")]));
        }

        let alerter_statements = vec![statement(
            &["sns:Publish"],
            vec![reference(ALERT_TOPIC)],
        )];

        for (function, statements) in [
            (CRAWLER, crawler_statements),
            (NOTIFIER, notifier_statements),
            (ALERTER, alerter_statements),
        ] {
            let role = role_id(function);
            template.add(
                role.clone(),
                Resource::new(
                    "AWS::IAM::Role",
                    json!({
                        "AssumeRolePolicyDocument": {
                            "Version": "2012-10-17",
                            "Statement": [{
                                "Effect": "Allow",
                                "Principal": {"Service": "lambda.amazonaws.com"},
                                "Action": "sts:AssumeRole",
                            }],
                        },
                        "ManagedPolicyArns": [sub(BASIC_EXECUTION_POLICY)],
                    }),
                ),
            );
            template.add(
                policy_id(function),
                Resource::new(
                    "AWS::IAM::Policy",
                    json!({
                        "PolicyName": format!("{}Policy", role),
                        "PolicyDocument": {
                            "Version": "2012-10-17",
                            "Statement": statements,
                        },
                        "Roles": [reference(&role)],
                    }),
                ),
            );
        }
    }

    fn model_arns(&self) -> Vec<Value> {
        let model_id = &self.config.model_id;
        let region = &self.config.model_region;

        match inference_profile_base(model_id) {
            Some(base_model) => vec![
                sub(format!(
                    "arn:${{AWS::Partition}}:bedrock:{}:${{AWS::AccountId}}:inference-profile/{}",
                    region, model_id
                )),
                sub(format!(
                    "arn:${{AWS::Partition}}:bedrock:*::foundation-model/{}",
                    base_model
                )),
            ],
            None => vec![sub(format!(
                "arn:${{AWS::Partition}}:bedrock:{}::foundation-model/{}",
                region, model_id
            ))],
        }
    }

    fn add_functions(&self, template: &mut Template) -> Result<(), SynthError> {
        let config = self.config;
        let stack = &config.stack;

        let crawler_env = json!({
            "DDB_TABLE_NAME": reference(FEED_TABLE),
            "NOTIFICATION_LOOKBACK_DAYS": config.notification_lookback_days.to_string(),
            "RUST_LOG": "info",
        });
        let notifiers = serde_json::to_string(&config.notifiers)?;
        let summarizers = serde_json::to_string(&config.summarizers)?;
        let mut notifier_env = json!({
            "SUMMARIZER_PROVIDER": config.summarizer_provider.as_str(),
            "MODEL_ID": config.model_id,
            "MODEL_REGION": config.model_region,
            "NOTIFIERS": notifiers,
            "SUMMARIZERS": summarizers,
            "DDB_TABLE_NAME": reference(HISTORY_TABLE),
            "DELIVERY_INTERVAL_MS": stack.delivery_interval_ms.to_string(),
            "RUST_LOG": "info",
        });
        if let Some(parameter) = config.api_key_parameter() {
            notifier_env["ANTHROPIC_API_KEY_PARAMETER"] = json!(parameter);
        }
        let alerter_env = json!({
            "SNS_TOPIC_ARN": reference(ALERT_TOPIC),
            "ALERT_FORMAT": stack.alert_format.as_str(),
            "RUST_LOG": "info",
        });

        let functions = [
            (CRAWLER, &stack.artifacts.crawler_key, stack.crawler, crawler_env),
            (NOTIFIER, &stack.artifacts.notifier_key, stack.notifier, notifier_env),
            (ALERTER, &stack.artifacts.alerter_key, stack.alerter, alerter_env),
        ];

        for (function, key, settings, environment) in functions {
            let mut properties =
                function_properties(&stack.artifacts.bucket, key, settings, environment, function);
            if function == NOTIFIER {
                // Deliveries of one item must not race another invocation
                properties["ReservedConcurrentExecutions"] = json!(1);
            }

            template.add(
                function,
                Resource::new("AWS::Lambda::Function", properties).depends_on(&policy_id(function)),
            );
            template.add(
                log_group_id(function),
                Resource::new(
                    "AWS::Logs::LogGroup",
                    json!({
                        "LogGroupName": join("", vec![json!("/aws/lambda/"), reference(function)]),
                        "RetentionInDays": stack.log_retention_days,
                    }),
                ),
            );
        }

        Ok(())
    }

    fn add_schedules(&self, template: &mut Template) -> Result<(), SynthError> {
        for (name, notifier) in &self.config.notifiers {
            let request = CrawlRequest {
                notifier_name: name.clone(),
                notifier: notifier.clone(),
            };
            let rule = schedule_rule_id(name);
            let input = serde_json::to_string(&request)?;

            template.add(
                rule.clone(),
                Resource::new(
                    "AWS::Events::Rule",
                    json!({
                        "Description": format!("Crawl schedule for notifier {}", name),
                        "ScheduleExpression": notifier.schedule.expression(),
                        "State": "ENABLED",
                        "Targets": [{
                            "Id": "Crawler",
                            "Arn": get_att(CRAWLER, "Arn"),
                            "Input": input,
                            "RetryPolicy": {"MaximumRetryAttempts": 2},
                        }],
                    }),
                ),
            );
            template.add(
                format!("{}Permission", rule),
                invoke_permission("events.amazonaws.com", CRAWLER, get_att(&rule, "Arn")),
            );
        }
        Ok(())
    }

    fn add_stream_mapping(&self, template: &mut Template) {
        let pattern = json!({ "eventName": ["INSERT"] }).to_string();
        template.add(
            STREAM_MAPPING,
            Resource::new(
                "AWS::Lambda::EventSourceMapping",
                json!({
                    "EventSourceArn": get_att(FEED_TABLE, "StreamArn"),
                    "FunctionName": reference(NOTIFIER),
                    "BatchSize": 1,
                    "StartingPosition": "LATEST",
                    "MaximumRetryAttempts": STREAM_RETRY_ATTEMPTS,
                    "FilterCriteria": {"Filters": [{"Pattern": pattern}]},
                }),
            )
            .depends_on(&policy_id(NOTIFIER)),
        );
    }

    fn add_log_subscriptions(&self, template: &mut Template) {
        for function in [CRAWLER, NOTIFIER] {
            let log_group = log_group_id(function);
            let permission = format!("{}AlertInvokePermission", log_group);

            template.add(
                permission.clone(),
                invoke_permission("logs.amazonaws.com", ALERTER, get_att(&log_group, "Arn")),
            );
            template.add(
                format!("{}ErrorFilter", log_group),
                Resource::new(
                    "AWS::Logs::SubscriptionFilter",
                    json!({
                        "LogGroupName": reference(&log_group),
                        "FilterPattern": ERROR_FILTER_PATTERN,
                        "DestinationArn": get_att(ALERTER, "Arn"),
                    }),
                )
                .depends_on(&permission),
            );
        }
    }

    fn add_outputs(&self, template: &mut Template) {
        template.output("FeedItemTableName", "Feed item table", reference(FEED_TABLE));
        template.output(
            "NotificationHistoryTableName",
            "Notification history table",
            reference(HISTORY_TABLE),
        );
        template.output("AlertTopicArn", "Alert topic", reference(ALERT_TOPIC));
        template.output("CrawlerFunctionName", "Crawler function", reference(CRAWLER));
        template.output("NotifierFunctionName", "Notifier function", reference(NOTIFIER));
        if self.config.stack.alert_format == AlertFormat::Chatbot {
            template.output(
                "AlertFormat",
                "Alerts are published as chat client custom notifications",
                json!(AlertFormat::Chatbot.as_str()),
            );
        }
    }
}

fn table(stream_view: Option<&str>) -> Resource {
    let mut properties = json!({
        "AttributeDefinitions": [
            {"AttributeName": "url", "AttributeType": "S"},
            {"AttributeName": "notifier_name", "AttributeType": "S"},
        ],
        "KeySchema": [
            {"AttributeName": "url", "KeyType": "HASH"},
            {"AttributeName": "notifier_name", "KeyType": "RANGE"},
        ],
        "BillingMode": "PAY_PER_REQUEST",
    });
    if let Some(view) = stream_view {
        properties["StreamSpecification"] = json!({ "StreamViewType": view });
    }
    Resource::new("AWS::DynamoDB::Table", properties).retain()
}

fn statement(actions: &[&str], resources: Vec<Value>) -> Value {
    json!({
        "Effect": "Allow",
        "Action": actions,
        "Resource": resources,
    })
}

/// Base model of a cross-region inference profile ID, `None` for a plain
/// foundation model ID
pub fn inference_profile_base(model_id: &str) -> Option<&str> {
    CROSS_REGION_PREFIXES
        .iter()
        .find_map(|prefix| model_id.strip_prefix(prefix))
}

/// ARN of a parameter in the deploying account and region
pub fn parameter_arn(name: &str) -> Value {
    let separator = if name.starts_with('/') { "" } else { "/" };
    sub(format!(
        "arn:${{AWS::Partition}}:ssm:${{AWS::Region}}:${{AWS::AccountId}}:parameter{}{}",
        separator, name
    ))
}

fn function_properties(
    bucket: &str,
    key: &str,
    settings: FunctionSettings,
    environment: Value,
    function: &str,
) -> Value {
    json!({
        "Runtime": RUNTIME,
        "Handler": "bootstrap",
        "Architectures": ["arm64"],
        "Code": {"S3Bucket": bucket, "S3Key": key},
        "MemorySize": settings.memory_mb,
        "Timeout": settings.timeout_secs,
        "Role": get_att(&role_id(function), "Arn"),
        "Environment": {"Variables": environment},
    })
}

fn invoke_permission(principal: &str, function: &str, source_arn: Value) -> Resource {
    Resource::new(
        "AWS::Lambda::Permission",
        json!({
            "Action": "lambda:InvokeFunction",
            "FunctionName": get_att(function, "Arn"),
            "Principal": principal,
            "SourceArn": source_arn,
        }),
    )
}

fn function_prefix(function: &str) -> &str {
    function.strip_suffix("Function").unwrap_or(function)
}

pub fn role_id(function: &str) -> String {
    format!("{}Role", function_prefix(function))
}

pub fn policy_id(function: &str) -> String {
    format!("{}RolePolicy", function_prefix(function))
}

pub fn log_group_id(function: &str) -> String {
    format!("{}LogGroup", function_prefix(function))
}

/// Logical ID of a notifier's schedule rule.
///
/// The readable part keeps only alphanumerics, so a hash of the full name
/// keeps names like `a-b` and `a_b` apart.
pub fn schedule_rule_id(notifier_name: &str) -> String {
    let readable: String = notifier_name
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<String>()
        .chars()
        .take(64)
        .collect();

    let digest = Sha256::digest(notifier_name.as_bytes());
    let suffix: String = digest[..4].iter().map(|b| format!("{:02x}", b)).collect();

    format!("{}Schedule{}", readable, suffix)
}
