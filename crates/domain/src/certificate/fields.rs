use std::sync::LazyLock;

use super::{Certificate, CertificateState};
use crate::registry::{FieldRegistry, string_data};
use crate::time::now;
use crate::value::FieldValue;

fn optional_string(data: &serde_json::Value) -> Result<Option<String>, String> {
    if data.is_null() {
        return Ok(None);
    }
    string_data(data).map(Some)
}

pub(super) static CERTIFICATE_FIELDS: LazyLock<FieldRegistry<Certificate>> = LazyLock::new(|| {
    FieldRegistry::<Certificate>::new()
        .getter("common_name", |c| c.common_name.as_str().into())
        .getter("subject_dn", |c| c.subject_dn.as_str().into())
        .getter("issuer_dn", |c| c.issuer_dn.as_str().into())
        .getter("serial_number", |c| c.serial_number.as_str().into())
        .getter("fingerprint", |c| c.fingerprint.as_str().into())
        .getter("public_key_fingerprint", |c| {
            c.public_key_fingerprint.as_str().into()
        })
        .getter("not_before", |c| c.not_before.into())
        .getter("not_after", |c| c.not_after.into())
        .getter("subject_alternative_names", |c| {
            FieldValue::List(
                c.subject_alternative_names
                    .iter()
                    .map(|san| san.as_str().into())
                    .collect(),
            )
        })
        .getter("key_algorithm", |c| c.key_algorithm.as_str().into())
        .getter("group", |c| c.group.clone().into())
        .getter("owner", |c| c.owner.clone().into())
        .getter("state", |c| c.state.as_str().into())
        .getter("days_to_expiry", |c| c.days_to_expiry(now()).into())
        .setter("group", |c, data| {
            c.group = optional_string(data)?;
            Ok(())
        })
        .setter("owner", |c, data| {
            c.owner = optional_string(data)?;
            Ok(())
        })
        .setter("state", |c, data| {
            c.state = string_data(data)?.parse::<CertificateState>()?;
            Ok(())
        })
});
