//! Policy document model
//!
//! The model mirrors the JSON document one-to-one. Action, operator and
//! architecture fields keep their raw names; they are parsed into closed
//! enums only at the translation boundary so an unknown name is reported
//! as `InvalidAction`/`InvalidOperator`/`InvalidArchitecture` by the
//! compiler instead of failing the decode.

use policy_core::{PolicyError, Result};
use serde::{Deserialize, Deserializer, Serialize};
use std::io::Read;

/// A complete syscall filtering policy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Policy {
    /// Action for every syscall not matched by a rule
    pub default_action: String,
    /// Extra architectures the filter must also cover
    #[serde(default, deserialize_with = "null_as_empty")]
    pub architectures: Vec<String>,
    /// Syscall entries in declaration order; `null` entries are kept so the
    /// compiler can reject them
    #[serde(default, deserialize_with = "null_as_empty")]
    pub syscalls: Vec<Option<SyscallRule>>,
}

/// Action and optional argument conditions for one syscall
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyscallRule {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub action: String,
    /// Return code for `SCMP_ACT_ERRNO` and `SCMP_ACT_TRACE`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub errno_ret: Option<u16>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub args: Vec<Option<ArgCondition>>,
}

/// Comparison against one syscall argument register
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArgCondition {
    /// Argument position, 0 to 5
    pub index: u32,
    #[serde(default)]
    pub value: u64,
    /// Mask for `SCMP_CMP_MASKED_EQ`, ignored by the other operators
    #[serde(default)]
    pub value_two: u64,
    pub op: String,
}

fn null_as_empty<'de, D, T>(deserializer: D) -> std::result::Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

impl Policy {
    pub fn new(default_action: impl Into<String>) -> Self {
        Self {
            default_action: default_action.into(),
            architectures: Vec::new(),
            syscalls: Vec::new(),
        }
    }

    /// Decode a policy from JSON text
    pub fn from_json(content: &str) -> Result<Self> {
        serde_json::from_str(content).map_err(PolicyError::decode)
    }

    /// Decode a policy from a JSON stream
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        serde_json::from_reader(reader).map_err(PolicyError::decode)
    }

    pub fn with_architecture(mut self, arch: impl Into<String>) -> Self {
        self.architectures.push(arch.into());
        self
    }

    pub fn with_syscall(mut self, rule: SyscallRule) -> Self {
        self.syscalls.push(Some(rule));
        self
    }

    /// Iterate over the non-null syscall entries
    pub fn rules(&self) -> impl Iterator<Item = &SyscallRule> {
        self.syscalls.iter().flatten()
    }
}

impl SyscallRule {
    pub fn new(name: impl Into<String>, action: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            action: action.into(),
            errno_ret: None,
            args: Vec::new(),
        }
    }

    pub fn with_errno(mut self, errno: u16) -> Self {
        self.errno_ret = Some(errno);
        self
    }

    pub fn with_arg(mut self, arg: ArgCondition) -> Self {
        self.args.push(Some(arg));
        self
    }
}

impl ArgCondition {
    pub fn new(index: u32, op: impl Into<String>, value: u64) -> Self {
        Self {
            index,
            value,
            value_two: 0,
            op: op.into(),
        }
    }

    /// `(arg & mask) == value`
    pub fn masked(index: u32, mask: u64, value: u64) -> Self {
        Self {
            index,
            value,
            value_two: mask,
            op: "SCMP_CMP_MASKED_EQ".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use policy_core::ErrorKind;

    #[test]
    fn test_decode_full_document() {
        let policy = Policy::from_json(
            r#"{
                "defaultAction": "SCMP_ACT_ERRNO",
                "architectures": ["SCMP_ARCH_X86_64", "SCMP_ARCH_X86"],
                "syscalls": [
                    {"name": "read", "action": "SCMP_ACT_ALLOW"},
                    {"name": "personality", "action": "SCMP_ACT_ALLOW",
                     "args": [{"index": 0, "value": 8, "valueTwo": 0, "op": "SCMP_CMP_EQ"}]},
                    {"name": "mkdir", "action": "SCMP_ACT_ERRNO", "errnoRet": 13}
                ]
            }"#,
        )
        .unwrap();

        assert_eq!(policy.default_action, "SCMP_ACT_ERRNO");
        assert_eq!(policy.architectures.len(), 2);
        assert_eq!(policy.syscalls.len(), 3);

        let personality = policy.syscalls[1].as_ref().unwrap();
        assert_eq!(
            personality.args,
            vec![Some(ArgCondition::new(0, "SCMP_CMP_EQ", 8))]
        );
        assert_eq!(policy.syscalls[2].as_ref().unwrap().errno_ret, Some(13));
    }

    #[test]
    fn test_decode_optional_fields() {
        let policy = Policy::from_json(r#"{"defaultAction": "SCMP_ACT_ALLOW"}"#).unwrap();
        assert!(policy.architectures.is_empty());
        assert!(policy.syscalls.is_empty());

        let policy = Policy::from_json(
            r#"{"defaultAction": "SCMP_ACT_ALLOW", "architectures": null, "syscalls": null}"#,
        )
        .unwrap();
        assert!(policy.architectures.is_empty());
        assert!(policy.syscalls.is_empty());
    }

    #[test]
    fn test_decode_keeps_null_entries() {
        let policy = Policy::from_json(
            r#"{"defaultAction": "SCMP_ACT_ALLOW",
                "syscalls": [null, {"name": "read", "action": "SCMP_ACT_LOG", "args": [null]}]}"#,
        )
        .unwrap();
        assert_eq!(policy.syscalls.len(), 2);
        assert!(policy.syscalls[0].is_none());
        assert_eq!(policy.rules().count(), 1);
        assert_eq!(policy.syscalls[1].as_ref().unwrap().args, vec![None]);
    }

    #[test]
    fn test_unknown_names_survive_decoding() {
        let policy = Policy::from_json(
            r#"{"defaultAction": "BOGUS", "architectures": ["SCMP_ARCH_VAX"]}"#,
        )
        .unwrap();
        assert_eq!(policy.default_action, "BOGUS");
        assert_eq!(policy.architectures, vec!["SCMP_ARCH_VAX".to_string()]);
    }

    #[test]
    fn test_decode_errors() {
        let err = Policy::from_json("{not json").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Decode);

        let err = Policy::from_json(r#"{"syscalls": []}"#).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Decode);

        // errnoRet is a 16-bit code
        let err = Policy::from_json(
            r#"{"defaultAction": "SCMP_ACT_ALLOW",
                "syscalls": [{"name": "read", "action": "SCMP_ACT_ERRNO", "errnoRet": 70000}]}"#,
        )
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Decode);
    }

    #[test]
    fn test_builder_helpers_serialize_back() {
        let policy = Policy::new("SCMP_ACT_ERRNO")
            .with_architecture("SCMP_ARCH_X86_64")
            .with_syscall(
                SyscallRule::new("clone", "SCMP_ACT_ALLOW")
                    .with_arg(ArgCondition::masked(0, 0x7E020000, 0)),
            )
            .with_syscall(SyscallRule::new("mount", "SCMP_ACT_ERRNO").with_errno(1));

        let json = serde_json::to_string_pretty(&policy).unwrap();
        assert!(json.contains("\"defaultAction\""));
        assert!(json.contains("\"valueTwo\": 2114060288"));
        assert_eq!(Policy::from_json(&json).unwrap(), policy);
    }

    #[test]
    fn test_from_reader() {
        let input = br#"{"defaultAction": "SCMP_ACT_KILL"}"#;
        let policy = Policy::from_reader(&input[..]).unwrap();
        assert_eq!(policy.default_action, "SCMP_ACT_KILL");
    }
}
