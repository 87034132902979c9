//! Calendar style schedules for crawl triggers

use serde::{Deserialize, Deserializer, Serialize};

/// Calendar cron fields. Unset fields fall back the way EventBridge cron
/// expressions require: `*` for minute, hour, month and year, and exactly
/// one of day / week day set to `?`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct CronSchedule {
    #[serde(default, deserialize_with = "cron_field", skip_serializing_if = "Option::is_none")]
    pub minute: Option<String>,
    #[serde(default, deserialize_with = "cron_field", skip_serializing_if = "Option::is_none")]
    pub hour: Option<String>,
    #[serde(default, deserialize_with = "cron_field", skip_serializing_if = "Option::is_none")]
    pub day: Option<String>,
    #[serde(default, deserialize_with = "cron_field", skip_serializing_if = "Option::is_none")]
    pub month: Option<String>,
    #[serde(
        default,
        alias = "weekDay",
        deserialize_with = "cron_field",
        skip_serializing_if = "Option::is_none"
    )]
    pub week_day: Option<String>,
    #[serde(default, deserialize_with = "cron_field", skip_serializing_if = "Option::is_none")]
    pub year: Option<String>,
}

impl CronSchedule {
    /// Once per hour, on the hour
    pub fn hourly() -> Self {
        Self {
            minute: Some("0".to_string()),
            ..Default::default()
        }
    }

    /// Check field combinations EventBridge rejects
    pub fn validate(&self) -> Result<(), String> {
        if self.day.is_some() && self.week_day.is_some() {
            return Err("cannot supply both 'day' and 'week_day'".to_string());
        }

        let fields = [
            ("minute", &self.minute),
            ("hour", &self.hour),
            ("day", &self.day),
            ("month", &self.month),
            ("week_day", &self.week_day),
            ("year", &self.year),
        ];
        for (name, value) in fields {
            if let Some(value) = value {
                if value.trim().is_empty() || value.chars().any(char::is_whitespace) {
                    return Err(format!("field '{}' must be a single cron token", name));
                }
            }
        }

        Ok(())
    }

    /// Render as an EventBridge `cron(...)` schedule expression
    pub fn expression(&self) -> String {
        let day = self
            .day
            .clone()
            .unwrap_or_else(|| if self.week_day.is_some() { "?" } else { "*" }.to_string());
        let week_day = self.week_day.clone().unwrap_or_else(|| "?".to_string());

        format!(
            "cron({} {} {} {} {} {})",
            self.minute.as_deref().unwrap_or("*"),
            self.hour.as_deref().unwrap_or("*"),
            day,
            self.month.as_deref().unwrap_or("*"),
            week_day,
            self.year.as_deref().unwrap_or("*"),
        )
    }
}

fn cron_field<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Field {
        Text(String),
        Number(u64),
    }

    Ok(Option::<Field>::deserialize(deserializer)?.map(|field| match field {
        Field::Text(text) => text,
        Field::Number(number) => number.to_string(),
    }))
}
