//! Constructor arguments and transaction overrides.

use alloy_core::{
    dyn_abi::{DynSolValue, JsonAbiExt, Specifier},
    json_abi::{Constructor, Param},
    primitives::{Bytes, U256},
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::DeployError;

/// Per-deployment transaction settings.
///
/// Serialized in camelCase, e.g. `{"gasLimit": 5000000, "estimateGas": false}`. The nonce is never part of the overrides, it is allocated for every attempt.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TxOverrides {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gas_limit: Option<u64>,
    /// Gas price in wei.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gas_price: Option<u128>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<U256>,
    /// Estimate gas before sending, the session setting applies when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimate_gas: Option<bool>,
}

impl TxOverrides {
    /// Overrides that only turn the pre-flight gas estimate off.
    pub fn without_estimate() -> Self {
        Self {
            estimate_gas: Some(false),
            ..Default::default()
        }
    }
}

/// One positional argument as a caller may hand it over.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    Arg(DynSolValue),
    Overrides(TxOverrides),
}

impl From<DynSolValue> for ParamValue {
    fn from(value: DynSolValue) -> Self {
        Self::Arg(value)
    }
}

impl From<TxOverrides> for ParamValue {
    fn from(overrides: TxOverrides) -> Self {
        Self::Overrides(overrides)
    }
}

/// Constructor (or initializer) arguments plus optional transaction overrides.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeployParams {
    pub args: Vec<DynSolValue>,
    pub overrides: Option<TxOverrides>,
}

impl DeployParams {
    pub fn new(args: Vec<DynSolValue>) -> Self {
        Self {
            args,
            overrides: None,
        }
    }

    /// No arguments, no overrides.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_overrides(mut self, overrides: TxOverrides) -> Self {
        self.overrides = Some(overrides);
        self
    }

    /// Split a positional list whose last entry may be transaction overrides.
    ///
    /// Overrides anywhere but the last position are rejected.
    pub fn from_positional(values: Vec<ParamValue>) -> Result<Self, DeployError> {
        let mut args = Vec::with_capacity(values.len());
        let mut overrides = None;
        let last = values.len().saturating_sub(1);

        for (index, value) in values.into_iter().enumerate() {
            match value {
                ParamValue::Arg(arg) => args.push(arg),
                ParamValue::Overrides(o) if index == last => overrides = Some(o),
                ParamValue::Overrides(_) => {
                    return Err(DeployError::encoding(
                        "deploy parameters",
                        format!("transaction overrides at position {index}, only the last position is allowed"),
                    ));
                }
            }
        }

        Ok(Self { args, overrides })
    }

    /// ABI-encode the arguments as a parameter tuple, without checking them against an ABI.
    pub fn encode_args(&self) -> Vec<u8> {
        if self.args.is_empty() {
            return Vec::new();
        }
        DynSolValue::Tuple(self.args.clone()).abi_encode_params()
    }

    /// The arguments rendered as JSON, the way they are persisted in the ledger.
    pub fn render_args(&self) -> Vec<Value> {
        self.args.iter().map(render_value).collect()
    }
}

/// Encode `args` against `constructor` for the ledger's audit trail.
///
/// Arguments that do not type-check, or whose count differs from the constructor's inputs,
/// are reported as [`DeployError::EncodingUnavailable`].
pub fn encode_constructor_args(
    constructor: Option<&Constructor>,
    args: &[DynSolValue],
) -> Result<Bytes, DeployError> {
    match constructor {
        Some(constructor) => constructor
            .abi_encode_input(args)
            .map(Bytes::from)
            .map_err(|e| DeployError::encoding("constructor arguments", e)),
        None if args.is_empty() => Ok(Bytes::new()),
        None => Err(DeployError::encoding(
            "constructor arguments",
            format!("contract has no constructor but {} arguments were given", args.len()),
        )),
    }
}

/// Parse JSON arguments against ABI parameters.
///
/// Strings are coerced with the Solidity literal syntax (`"0x..."`, `"1000"`), JSON arrays
/// are accepted for array and tuple parameters.
pub fn parse_args(inputs: &[Param], values: &[Value]) -> Result<Vec<DynSolValue>, DeployError> {
    if inputs.len() != values.len() {
        return Err(DeployError::encoding(
            "arguments",
            format!("expected {} arguments, got {}", inputs.len(), values.len()),
        ));
    }

    inputs
        .iter()
        .zip(values)
        .map(|(param, value)| {
            let ty = param
                .resolve()
                .map_err(|e| DeployError::encoding(format!("type of {}", param.name), e))?;
            ty.coerce_str(&literal(value))
                .map_err(|e| DeployError::encoding(format!("argument {}", param.name), e))
        })
        .collect()
}

/// Solidity literal for a JSON value, e.g. `[0xab..,0xcd..]` for an array of addresses.
fn literal(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Array(items) => {
            let items: Vec<String> = items.iter().map(literal).collect();
            format!("[{}]", items.join(","))
        }
        other => other.to_string(),
    }
}

/// JSON rendering of an ABI value: checksummed addresses, integers as decimal strings.
pub fn render_value(value: &DynSolValue) -> Value {
    match value {
        DynSolValue::Address(address) => Value::String(address.to_checksum(None)),
        DynSolValue::Bool(b) => Value::Bool(*b),
        DynSolValue::Uint(n, _) => Value::String(n.to_string()),
        DynSolValue::Int(n, _) => Value::String(n.to_string()),
        DynSolValue::String(s) => Value::String(s.clone()),
        DynSolValue::Bytes(bytes) => Value::String(format!("0x{}", hex::encode(bytes))),
        DynSolValue::FixedBytes(word, size) => {
            Value::String(format!("0x{}", hex::encode(&word[..*size])))
        }
        DynSolValue::Array(items)
        | DynSolValue::FixedArray(items)
        | DynSolValue::Tuple(items) => Value::Array(items.iter().map(render_value).collect()),
        other => match other.as_type() {
            Some(ty) => Value::String(format!("<{ty}>")),
            None => Value::Null,
        },
    }
}
