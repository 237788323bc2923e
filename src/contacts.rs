//! Contact list import.
//!
//! Contacts come in as CSV with the columns
//! `phone, first_name, company, msg1, fup1_days, fup1_msg, fup2_days, fup2_msg, …`
//! extensible to any number of `fupN_days`/`fupN_msg` pairs. The step list
//! for a contact ends at the first empty or absent `fupN_msg`.

use std::collections::BTreeMap;
use std::path::Path;

use crate::error::ContactsError;
use crate::phone::{self, PhoneKey};

/// One message in a contact's campaign.
///
/// Step 0 is the initial message; later steps are follow-ups whose delay is
/// counted in days from the first confirmed send.
#[derive(Debug, Clone)]
pub struct Step {
    pub delay_days: i64,
    pub template: String,
}

/// A contact plus their campaign definition.
#[derive(Debug, Clone)]
pub struct Contact {
    /// Number handed to the send capability: digits plus optional leading `+`.
    pub phone: String,
    /// Canonical identity used for progress records and reply lookup.
    pub key: PhoneKey,
    /// All CSV columns, exposed to templates as `{column_name}`.
    pub attrs: BTreeMap<String, String>,
    /// Step 0 = initial message, 1..N = follow-ups.
    pub steps: Vec<Step>,
}

/// Load and normalize the contact list.
///
/// Rows without a usable phone number or without an initial message are
/// skipped with a warning; they cannot participate in the campaign.
pub fn load(path: &Path) -> Result<Vec<Contact>, ContactsError> {
    let mut reader = csv::Reader::from_path(path).map_err(ContactsError::Csv)?;
    let headers: Vec<String> = reader
        .headers()?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();
    for required in ["phone", "msg1"] {
        if !headers.iter().any(|h| h == required) {
            return Err(ContactsError::MissingColumn(required.to_string()));
        }
    }

    let mut contacts = Vec::new();
    for (row_idx, record) in reader.records().enumerate() {
        let record = record?;
        let row: BTreeMap<String, String> = headers
            .iter()
            .cloned()
            .zip(record.iter().map(|v| v.trim().to_string()))
            .collect();

        let raw_phone = row.get("phone").map(String::as_str).unwrap_or_default();
        let (Some(phone), Some(key)) = (phone::dialable(raw_phone), PhoneKey::parse(raw_phone))
        else {
            tracing::warn!(row = row_idx + 2, "Skipping row with missing phone");
            continue;
        };

        let steps = build_steps(&row);
        if steps.is_empty() {
            tracing::warn!(contact = %key, "Skipping contact with empty msg1");
            continue;
        }

        contacts.push(Contact {
            phone,
            key,
            attrs: row,
            steps,
        });
    }
    Ok(contacts)
}

fn build_steps(row: &BTreeMap<String, String>) -> Vec<Step> {
    let mut steps = Vec::new();
    let msg1 = row.get("msg1").map(String::as_str).unwrap_or_default();
    if msg1.is_empty() {
        return steps;
    }
    steps.push(Step {
        delay_days: 0,
        template: msg1.to_string(),
    });

    for n in 1.. {
        let Some(template) = row.get(&format!("fup{n}_msg")).filter(|m| !m.is_empty()) else {
            break;
        };
        let delay_days = row
            .get(&format!("fup{n}_days"))
            .and_then(|d| d.parse::<i64>().ok())
            .unwrap_or(0);
        steps.push(Step {
            delay_days,
            template: template.clone(),
        });
    }
    steps
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_csv(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn loads_contacts_with_steps() {
        let file = write_csv(
            "phone,first_name,company,msg1,fup1_days,fup1_msg,fup2_days,fup2_msg\n\
             +19195550123,Ada,Analytical,Hi {first_name},2,Checking in,5,Last ping\n",
        );
        let contacts = load(file.path()).unwrap();
        assert_eq!(contacts.len(), 1);
        let c = &contacts[0];
        assert_eq!(c.phone, "+19195550123");
        assert_eq!(c.key.as_str(), "9195550123");
        assert_eq!(c.steps.len(), 3);
        assert_eq!(c.steps[0].delay_days, 0);
        assert_eq!(c.steps[1].delay_days, 2);
        assert_eq!(c.steps[2].delay_days, 5);
        assert_eq!(c.attrs.get("company").unwrap(), "Analytical");
    }

    #[test]
    fn step_list_ends_at_first_empty_followup() {
        let file = write_csv(
            "phone,first_name,msg1,fup1_days,fup1_msg,fup2_days,fup2_msg\n\
             +19195550123,Ada,Hi,2,,5,Never reached\n",
        );
        let contacts = load(file.path()).unwrap();
        assert_eq!(contacts[0].steps.len(), 1);
    }

    #[test]
    fn skips_rows_without_phone_or_initial_message() {
        let file = write_csv(
            "phone,first_name,msg1\n\
             ,NoPhone,Hi\n\
             +19195550123,NoMsg,\n\
             +19195550199,Ok,Hi {first_name}\n",
        );
        let contacts = load(file.path()).unwrap();
        assert_eq!(contacts.len(), 1);
        assert_eq!(contacts[0].key.as_str(), "9195550199");
    }

    #[test]
    fn blank_delay_defaults_to_zero() {
        let file = write_csv(
            "phone,first_name,msg1,fup1_days,fup1_msg\n\
             +19195550123,Ada,Hi,,Checking in\n",
        );
        let contacts = load(file.path()).unwrap();
        assert_eq!(contacts[0].steps[1].delay_days, 0);
    }

    #[test]
    fn missing_phone_column_is_error() {
        let file = write_csv("name,msg1\nAda,Hi\n");
        let err = load(file.path()).unwrap_err();
        assert!(matches!(err, ContactsError::MissingColumn(ref c) if c == "phone"));
    }
}
