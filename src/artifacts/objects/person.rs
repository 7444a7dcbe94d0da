//! Author, committer, and tagger identities
//!
//! A person record is the tuple `(name, email, timestamp, tz-offset)`
//! serialized as `Name <email> <unix-seconds> <±HHMM>` in commit and tag
//! headers.

use anyhow::Context;
use chrono::{DateTime, FixedOffset};

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Person {
    name: String,
    email: String,
    timestamp: DateTime<FixedOffset>,
}

impl Person {
    /// Create a person stamped with the current local time
    pub fn new(name: String, email: String) -> Self {
        Person {
            name,
            email,
            timestamp: chrono::Local::now().fixed_offset(),
        }
    }

    pub fn new_with_timestamp(
        name: String,
        email: String,
        timestamp: DateTime<FixedOffset>,
    ) -> Self {
        Person {
            name,
            email,
            timestamp,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn timestamp(&self) -> DateTime<FixedOffset> {
        self.timestamp
    }

    /// `Name <email>` without the timestamp
    pub fn display_name(&self) -> String {
        format!("{} <{}>", self.name, self.email)
    }

    /// The header serialization: `Name <email> <unix-seconds> <±HHMM>`
    pub fn display(&self) -> String {
        format!(
            "{} <{}> {} {}",
            self.name,
            self.email,
            self.timestamp.timestamp(),
            self.timestamp.format("%z")
        )
    }

    /// Human-readable form used by `log`
    pub fn readable_timestamp(&self) -> String {
        self.timestamp
            .format("%a %b %-d %H:%M:%S %Y %z")
            .to_string()
    }

    /// Author identity from `GIT_AUTHOR_NAME` / `GIT_AUTHOR_EMAIL` /
    /// `GIT_AUTHOR_DATE`
    pub fn author_from_env() -> anyhow::Result<Self> {
        Self::from_env_vars("GIT_AUTHOR_NAME", "GIT_AUTHOR_EMAIL", "GIT_AUTHOR_DATE")
    }

    /// Committer identity from the `GIT_COMMITTER_*` variables, falling
    /// back to the author variables
    pub fn committer_from_env() -> anyhow::Result<Self> {
        Self::from_env_vars(
            "GIT_COMMITTER_NAME",
            "GIT_COMMITTER_EMAIL",
            "GIT_COMMITTER_DATE",
        )
        .or_else(|_| Self::author_from_env())
    }

    fn from_env_vars(name_var: &str, email_var: &str, date_var: &str) -> anyhow::Result<Self> {
        let name = std::env::var(name_var).with_context(|| format!("{name_var} not set"))?;
        let email = std::env::var(email_var).with_context(|| format!("{email_var} not set"))?;
        let timestamp = std::env::var(date_var)
            .ok()
            .and_then(|date| Self::parse_date(&date));

        match timestamp {
            Some(timestamp) => Ok(Person::new_with_timestamp(name, email, timestamp)),
            None => Ok(Person::new(name, email)),
        }
    }

    /// Accepted date forms: the raw `<unix-seconds> <±HHMM>` header form,
    /// RFC 2822, and `%Y-%m-%d %H:%M:%S %z`
    fn parse_date(value: &str) -> Option<DateTime<FixedOffset>> {
        if let Some((seconds, offset)) = value.split_once(' ')
            && let Ok(seconds) = seconds.parse::<i64>()
            && let Some(offset) = parse_offset(offset)
        {
            return DateTime::from_timestamp(seconds, 0)
                .map(|datetime| datetime.with_timezone(&offset));
        }

        DateTime::parse_from_rfc2822(value)
            .or_else(|_| DateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S %z"))
            .ok()
    }
}

impl TryFrom<&str> for Person {
    type Error = anyhow::Error;

    /// Parse `Name <email> <unix-seconds> <±HHMM>`
    fn try_from(value: &str) -> anyhow::Result<Self> {
        let parts: Vec<&str> = value.rsplitn(3, ' ').collect();
        if parts.len() < 3 {
            anyhow::bail!("invalid person record: {value}");
        }

        let offset = parse_offset(parts[0])
            .ok_or_else(|| anyhow::anyhow!("invalid timezone offset: {}", parts[0]))?;
        let seconds = parts[1]
            .parse::<i64>()
            .with_context(|| format!("invalid timestamp: {}", parts[1]))?;
        let name_email = parts[2];

        let email_start = name_email
            .find('<')
            .ok_or_else(|| anyhow::anyhow!("invalid person record: missing '<'"))?;
        let email_end = name_email
            .find('>')
            .filter(|end| *end > email_start)
            .ok_or_else(|| anyhow::anyhow!("invalid person record: missing '>'"))?;

        let name = name_email[..email_start].trim().to_string();
        let email = name_email[email_start + 1..email_end].to_string();

        let timestamp = DateTime::from_timestamp(seconds, 0)
            .ok_or_else(|| anyhow::anyhow!("timestamp out of range: {seconds}"))?
            .with_timezone(&offset);

        Ok(Person {
            name,
            email,
            timestamp,
        })
    }
}

/// Parse a signed four-digit `±HHMM` offset
fn parse_offset(value: &str) -> Option<FixedOffset> {
    if value.len() != 5 {
        return None;
    }

    let sign = match value.as_bytes()[0] {
        b'+' => 1,
        b'-' => -1,
        _ => return None,
    };
    let hours = value[1..3].parse::<i32>().ok()?;
    let minutes = value[3..5].parse::<i32>().ok()?;

    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_display_and_parse_round_trip() {
        let timestamp = DateTime::parse_from_rfc3339("2023-11-14T22:13:20+00:00").unwrap();
        let person =
            Person::new_with_timestamp("A".to_string(), "a@x".to_string(), timestamp);

        assert_eq!(person.display(), "A <a@x> 1700000000 +0000");

        let parsed = Person::try_from(person.display().as_str()).unwrap();
        assert_eq!(parsed, person);
    }

    #[test]
    fn test_parse_negative_offset() {
        let parsed = Person::try_from("Jane Doe <jane@example.com> 1700000000 -0530").unwrap();

        assert_eq!(parsed.name(), "Jane Doe");
        assert_eq!(parsed.email(), "jane@example.com");
        assert_eq!(parsed.timestamp().timestamp(), 1700000000);
        assert!(parsed.display().ends_with("-0530"));
    }

    #[test]
    fn test_parse_raw_env_date() {
        let timestamp = Person::parse_date("1700000000 +0000").unwrap();
        assert_eq!(timestamp.timestamp(), 1700000000);
    }

    #[test]
    fn test_rejects_mangled_records() {
        assert!(Person::try_from("no email here 1700000000 +0000").is_err());
        assert!(Person::try_from("A <a@x> notatime +0000").is_err());
        assert!(Person::try_from("A <a@x> 1700000000 UTC").is_err());
    }
}
