//! RadiantScript compiler artifact model.
//!
//! A typed view of the JSON emitted by the RadiantScript compiler, used
//! by the VM for source-level mapping while stepping contract bytecode.
//! Unknown fields are treated as opaque and ignored. Fetching or
//! persisting artifact files is the front-end's concern; this module
//! only parses and queries.

use serde::Deserialize;

use rxd_script::Script;

/// A named, typed parameter of a contract constructor or function.
#[derive(Debug, Clone, Deserialize)]
pub struct AbiParam {
    /// Parameter name.
    pub name: String,
    /// RadiantScript type name (e.g. "int", "bytes20", "sig").
    #[serde(rename = "type", default)]
    pub type_name: String,
}

/// One spendable function of the contract ABI.
#[derive(Debug, Clone, Deserialize)]
pub struct AbiFunction {
    /// Function name.
    pub name: String,
    /// Function inputs in call order.
    #[serde(default)]
    pub inputs: Vec<AbiParam>,
}

/// A half-open character range into the contract source.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct SourceRange {
    /// Start offset.
    pub start: u32,
    /// End offset.
    pub end: u32,
}

/// A mapping from one opcode index to the source statement it came from.
#[derive(Debug, Clone, Deserialize)]
pub struct SourceMapEntry {
    /// Opcode index within the contract bytecode.
    pub opcode: u32,
    /// Character range of the originating statement.
    pub range: SourceRange,
    /// The statement text.
    #[serde(default)]
    pub statement: String,
}

/// A compiled RadiantScript contract.
#[derive(Debug, Clone, Deserialize)]
pub struct Artifact {
    /// Contract name. The compiler has emitted this both as
    /// `contractName` and as `name` across versions.
    #[serde(rename = "contractName", alias = "name")]
    pub contract_name: String,
    /// Hex-encoded contract bytecode.
    pub bytecode: String,
    /// Newline-separated contract source.
    #[serde(default)]
    pub source: String,
    /// Constructor parameters.
    #[serde(rename = "constructorInputs", default)]
    pub constructor_inputs: Vec<AbiParam>,
    /// Spendable functions.
    #[serde(default)]
    pub abi: Vec<AbiFunction>,
    /// Opcode-to-source mapping, sorted by opcode index.
    #[serde(rename = "sourceMap", default)]
    pub source_map: Vec<SourceMapEntry>,
}

impl Artifact {
    /// Parse an artifact from its JSON text.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Decode the contract bytecode.
    pub fn script(&self) -> Result<Script, rxd_script::ScriptError> {
        Script::from_hex(&self.bytecode)
    }

    /// Whether a source map is available.
    pub fn has_source_map(&self) -> bool {
        !self.source_map.is_empty()
    }

    /// The source entry for an opcode index: the exact entry when one
    /// exists, otherwise the nearest entry before it.
    pub fn source_location(&self, opcode_index: usize) -> Option<&SourceMapEntry> {
        self.source_map
            .iter()
            .filter(|entry| entry.opcode as usize <= opcode_index)
            .max_by_key(|entry| entry.opcode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "contractName": "Counter",
        "constructorInputs": [{"name": "owner", "type": "bytes20"}],
        "abi": [{"name": "increment", "inputs": [{"name": "amount", "type": "int"}]}],
        "bytecode": "76a95179",
        "source": "contract Counter(bytes20 owner) { ... }",
        "sourceMap": [
            {"opcode": 0, "range": {"start": 0, "end": 10}, "statement": "owner"},
            {"opcode": 2, "range": {"start": 11, "end": 30}, "statement": "increment"}
        ],
        "compiler": {"name": "radc", "version": "0.3.0"},
        "updatedAt": "2026-01-01T00:00:00Z"
    }"#;

    #[test]
    fn test_parse_ignores_unknown_fields() {
        let artifact = Artifact::from_json(SAMPLE).unwrap();
        assert_eq!(artifact.contract_name, "Counter");
        assert_eq!(artifact.constructor_inputs.len(), 1);
        assert_eq!(artifact.abi[0].name, "increment");
        assert_eq!(artifact.abi[0].inputs[0].type_name, "int");
        assert_eq!(artifact.script().unwrap().len(), 4);
    }

    #[test]
    fn test_name_alias() {
        let artifact =
            Artifact::from_json(r#"{"name": "Legacy", "bytecode": "51"}"#).unwrap();
        assert_eq!(artifact.contract_name, "Legacy");
        assert!(!artifact.has_source_map());
    }

    #[test]
    fn test_source_location_nearest_preceding() {
        let artifact = Artifact::from_json(SAMPLE).unwrap();
        assert_eq!(artifact.source_location(0).unwrap().statement, "owner");
        assert_eq!(artifact.source_location(1).unwrap().statement, "owner");
        assert_eq!(artifact.source_location(2).unwrap().statement, "increment");
        assert_eq!(artifact.source_location(99).unwrap().statement, "increment");
    }

    #[test]
    fn test_rejects_missing_bytecode() {
        assert!(Artifact::from_json(r#"{"contractName": "X"}"#).is_err());
    }
}
