use ethers::abi::{self, ParamType, Token};
use ethers::types::Address;

use super::abi::{decode_u8, encode_call};
use crate::error::{AppError, Result};

pub const AGGREGATE3: &str = "aggregate3((address,bool,bytes)[])";

/// One sub-call of a Multicall3 `aggregate3` batch.
#[derive(Debug, Clone)]
pub struct Call3 {
    pub target: Address,
    pub allow_failure: bool,
    pub call_data: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallResult {
    pub success: bool,
    pub return_data: Vec<u8>,
}

pub fn encode_aggregate3(calls: &[Call3]) -> Vec<u8> {
    let items = calls
        .iter()
        .map(|call| {
            Token::Tuple(vec![
                Token::Address(call.target),
                Token::Bool(call.allow_failure),
                Token::Bytes(call.call_data.clone()),
            ])
        })
        .collect();
    encode_call(AGGREGATE3, &[Token::Array(items)])
}

pub fn decode_aggregate3(data: &[u8], expected: usize) -> Result<Vec<CallResult>> {
    let result_type = ParamType::Array(Box::new(ParamType::Tuple(vec![
        ParamType::Bool,
        ParamType::Bytes,
    ])));
    let items = abi::decode(&[result_type], data)
        .map_err(|e| AppError::Decode(format!("aggregate3: {}", e)))?
        .into_iter()
        .next()
        .and_then(Token::into_array)
        .ok_or_else(|| AppError::Decode("aggregate3: expected result array".to_string()))?;

    if items.len() != expected {
        return Err(AppError::Decode(format!(
            "aggregate3: expected {} results, got {}",
            expected,
            items.len()
        )));
    }

    items
        .into_iter()
        .map(|item| {
            let mut parts = item
                .into_tuple()
                .ok_or_else(|| AppError::Decode("aggregate3: result is not a tuple".to_string()))?
                .into_iter();
            let success = parts.next().and_then(Token::into_bool);
            let return_data = parts.next().and_then(Token::into_bytes);
            match (success, return_data) {
                (Some(success), Some(return_data)) => Ok(CallResult {
                    success,
                    return_data,
                }),
                _ => Err(AppError::Decode("aggregate3: malformed result".to_string())),
            }
        })
        .collect()
}

/// Decodes each result as a `uint8`. Failed sub-calls and undecodable data become `None`.
pub fn u8_results(label: &'static str, results: Vec<CallResult>) -> Vec<Option<u8>> {
    results
        .into_iter()
        .map(|result| {
            if !result.success {
                return None;
            }
            decode_u8(label, &result.return_data).ok()
        })
        .collect()
}

#[cfg(test)]
pub(crate) fn encode_results(results: &[CallResult]) -> Vec<u8> {
    abi::encode(&[Token::Array(
        results
            .iter()
            .map(|result| {
                Token::Tuple(vec![
                    Token::Bool(result.success),
                    Token::Bytes(result.return_data.clone()),
                ])
            })
            .collect(),
    )])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::abi::selector;

    #[test]
    fn encode_aggregate3_uses_multicall_selector() {
        let calls = vec![Call3 {
            target: Address::repeat_byte(0x22),
            allow_failure: true,
            call_data: vec![1, 2, 3, 4],
        }];
        let data = encode_aggregate3(&calls);
        assert_eq!(&data[..4], &selector(AGGREGATE3));
        assert_eq!(hex::encode(&data[..4]), "82ad56cb");
    }

    #[test]
    fn decode_aggregate3_keeps_failures_in_place() {
        let results = vec![
            CallResult {
                success: true,
                return_data: vec![0u8; 32],
            },
            CallResult {
                success: false,
                return_data: Vec::new(),
            },
        ];
        let decoded = decode_aggregate3(&encode_results(&results), 2).unwrap();
        assert_eq!(decoded, results);
    }

    #[test]
    fn u8_results_keep_failed_cells_as_none() {
        let word = |value: u64| abi::encode(&[Token::Uint(value.into())]);
        let results = vec![
            CallResult {
                success: true,
                return_data: word(2),
            },
            CallResult {
                success: false,
                return_data: word(1),
            },
            CallResult {
                success: true,
                return_data: Vec::new(),
            },
            CallResult {
                success: true,
                return_data: word(300),
            },
            CallResult {
                success: true,
                return_data: word(0),
            },
        ];
        assert_eq!(
            u8_results("gameBoards", results),
            vec![Some(2), None, None, None, Some(0)]
        );
    }

    #[test]
    fn decode_aggregate3_rejects_length_mismatch() {
        let results = vec![CallResult {
            success: true,
            return_data: vec![0u8; 32],
        }];
        assert!(decode_aggregate3(&encode_results(&results), 9).is_err());
    }
}
