//! Image build history.

use std::borrow::Cow;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

const SHELL_PREFIX: &str = "/bin/sh -c ";
const NOP_PREFIX: &str = "#(nop) ";

/// One build step of an image, paired by index with a filesystem layer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryEntry {
    /// The decoded v1 compatibility record.
    #[serde(rename = "v1Compatibility")]
    pub v1_compatibility: V1CompatibilityRecord,
}

/// History entry as it appears on the wire: the record is a JSON document
/// serialized into a string inside the manifest.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct RawHistoryEntry {
    #[serde(rename = "v1Compatibility")]
    v1_compatibility: String,
}

impl RawHistoryEntry {
    /// Second decoding pass over the embedded JSON string.
    pub(crate) fn decode(&self) -> Result<HistoryEntry, serde_json::Error> {
        let v1_compatibility = serde_json::from_str(&self.v1_compatibility)?;
        Ok(HistoryEntry { v1_compatibility })
    }
}

/// The legacy image record kept for v1 compatibility.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct V1CompatibilityRecord {
    /// Image id of this step.
    pub id: String,

    /// Image id of the previous step. Absent for the base layer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,

    /// Marks steps which produced no filesystem changes.
    #[serde(default)]
    pub throwaway: bool,

    /// When the step ran.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<DateTime<Utc>>,

    /// Configuration of the container which ran the step.
    #[serde(default, deserialize_with = "null_as_default")]
    pub container_config: ContainerConfig,
}

impl V1CompatibilityRecord {
    /// The step's command line in Dockerfile-like form.
    ///
    /// See [`normalize_command`].
    pub fn command(&self) -> String {
        let joined = self
            .container_config
            .cmd
            .iter()
            .map(|token| token.trim())
            .collect::<Vec<_>>()
            .join(" ");
        normalize_command(&joined).into_owned()
    }
}

/// Container configuration. Only the command is modelled.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerConfig {
    /// Command line tokens.
    #[serde(rename = "Cmd", default, deserialize_with = "null_as_default")]
    pub cmd: Vec<String>,
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Rewrite a shell-wrapped build command into Dockerfile-like form.
///
/// `/bin/sh -c #(nop) COPY file` becomes `COPY file`, `/bin/sh -c apt-get update`
/// becomes `RUN apt-get update`; anything else is returned as is.
pub fn normalize_command(cmd: &str) -> Cow<'_, str> {
    let Some(rest) = cmd.strip_prefix(SHELL_PREFIX) else {
        return Cow::Borrowed(cmd);
    };

    match rest.strip_prefix(NOP_PREFIX) {
        Some(instruction) => Cow::Borrowed(instruction),
        None => Cow::Owned(format!("RUN {rest}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nop_commands_lose_their_shell() {
        assert_eq!(normalize_command("/bin/sh -c #(nop) COPY file"), "COPY file");
        assert_eq!(
            normalize_command("/bin/sh -c #(nop)  CMD [\"sh\"]"),
            " CMD [\"sh\"]"
        );
    }

    #[test]
    fn shell_commands_become_run() {
        assert_eq!(
            normalize_command("/bin/sh -c apt-get update"),
            "RUN apt-get update"
        );
    }

    #[test]
    fn other_commands_are_unchanged() {
        for cmd in ["", "echo hi", "/bin/bash -c ls", "/bin/sh -c"] {
            assert_eq!(normalize_command(cmd), cmd);
        }
    }

    #[test]
    fn decode_double_encoded_record() {
        let raw: RawHistoryEntry = serde_json::from_str(
            r##"{"v1Compatibility": "{\"id\":\"b2\",\"parent\":\"a1\",\"created\":\"2022-03-01T10:00:00.5Z\",\"container_config\":{\"Cmd\":[\"/bin/sh\",\"-c\",\"#(nop) \",\"COPY file:abc in / \"]},\"throwaway\":true}"}"##,
        )
        .unwrap();

        let entry = raw.decode().unwrap();
        let record = &entry.v1_compatibility;
        assert_eq!(record.id, "b2");
        assert_eq!(record.parent.as_deref(), Some("a1"));
        assert!(record.throwaway);
        assert_eq!(
            record.created.unwrap().to_rfc3339(),
            "2022-03-01T10:00:00.500+00:00"
        );
        assert_eq!(record.command(), "COPY file:abc in /");
    }

    #[test]
    fn base_layer_record_has_no_parent_or_command() {
        let raw: RawHistoryEntry = serde_json::from_str(
            r#"{"v1Compatibility": "{\"id\":\"a1\",\"container_config\":{\"Cmd\":null}}"}"#,
        )
        .unwrap();

        let record = raw.decode().unwrap().v1_compatibility;
        assert_eq!(record.parent, None);
        assert!(!record.throwaway);
        assert!(record.container_config.cmd.is_empty());
        assert_eq!(record.command(), "");
    }

    #[test]
    fn history_must_be_a_string() {
        let raw: RawHistoryEntry =
            serde_json::from_str(r#"{"v1Compatibility": "{not json"}"#).unwrap();
        assert!(raw.decode().is_err());

        let nested = serde_json::from_str::<RawHistoryEntry>(r#"{"v1Compatibility": {"id": "a1"}}"#);
        assert!(nested.is_err());
    }
}
