//! Synth command - render the CloudFormation template

use anyhow::{Context, Result};
use aws_config::BehaviorVersion;
use std::fs;
use std::path::PathBuf;
use summary_notifier_adapters::secrets::SsmSecretStore;
use summary_notifier_domain::DeploymentConfig;
use summary_notifier_domain::stack::{
    AcceptAllCatalog, ParameterCatalog, StackSynthesizer, StaticCatalog, Template,
};

use crate::args::SynthArgs;
use crate::config;

pub async fn execute(args: SynthArgs, config_path: Option<PathBuf>) -> Result<()> {
    let config = config::load(config_path.as_deref())?;

    let template = if args.skip_parameter_check {
        tracing::warn!("Skipping parameter check; deployment fails if a parameter is missing");
        synthesize(&config, &AcceptAllCatalog)?
    } else {
        let catalog = parameter_catalog(&config).await?;
        synthesize(&config, &catalog)?
    };

    let json = template
        .to_json_pretty()
        .context("Failed to serialize template")?;

    match args.out {
        Some(path) => {
            fs::write(&path, format!("{}\n", json))
                .with_context(|| format!("Failed to write template: {}", path.display()))?;
            eprintln!(
                "Wrote {} resources to {}",
                template.resources.len(),
                path.display()
            );
        }
        None => println!("{}", json),
    }

    Ok(())
}

fn synthesize<P: ParameterCatalog>(config: &DeploymentConfig, catalog: &P) -> Result<Template> {
    StackSynthesizer::new(config, catalog)
        .synthesize()
        .context("Stack synthesis failed")
}

/// Parameters referenced by destinations that exist in Parameter Store
async fn parameter_catalog(config: &DeploymentConfig) -> Result<StaticCatalog> {
    let names = config.referenced_parameters();
    tracing::info!(parameters = names.len(), "Checking referenced parameters");

    let aws = aws_config::load_defaults(BehaviorVersion::latest()).await;
    let store = SsmSecretStore::new(aws_sdk_ssm::Client::new(&aws));

    let found = store
        .existing_parameters(names)
        .await
        .context("Failed to look up parameters (use --skip-parameter-check to synthesize offline)")?;

    Ok(StaticCatalog::new(found))
}
