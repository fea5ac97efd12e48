//! 十六进制字符串与钱包地址的规范化
//!
//! 统一去掉 `0x`/`0X` 前缀并转为小写，再按需校验格式。

use crate::error::HexError;

const WALLET_HEX_LEN: usize = 40;

/// 是否为合法的钱包地址（20字节）
pub fn is_valid_wallet_address(wallet: &str) -> bool {
    is_wallet(&prepare_hex_internal(wallet))
}

/// 是否为合法的十六进制字符串（非空、偶数长度）
pub fn is_valid_hex(hex: &str) -> bool {
    is_hex(&prepare_hex_internal(hex))
}

/// 规范化钱包地址，返回不带前缀的小写形式
pub fn prepare_addr(wallet: &str) -> Result<String, HexError> {
    let prepared = prepare_hex_internal(wallet);
    if !is_wallet(&prepared) {
        return Err(HexError::InvalidAddress(wallet.to_string()));
    }
    Ok(prepared)
}

/// 规范化十六进制字符串，不校验格式；单独的 `0x` 视为 `00`
pub fn prepare_hex_no_matcher(hex: &str) -> String {
    if has_hex_prefix(hex) && hex.len() == 2 {
        return "00".to_string();
    }
    prepare_hex_internal(hex)
}

/// 规范化并校验十六进制字符串
pub fn prepare_hex(hex: &str) -> Result<String, HexError> {
    let prepared = prepare_hex_internal(hex);
    if !is_hex(&prepared) {
        return Err(HexError::InvalidHex(hex.to_string()));
    }
    Ok(prepared)
}

fn prepare_hex_internal(value: &str) -> String {
    remove_hex_prefix(value).to_lowercase()
}

fn remove_hex_prefix(value: &str) -> &str {
    if has_hex_prefix(value) {
        &value[2..]
    } else {
        value
    }
}

fn has_hex_prefix(value: &str) -> bool {
    value.starts_with("0x") || value.starts_with("0X")
}

fn is_wallet(prepared: &str) -> bool {
    prepared.len() == WALLET_HEX_LEN && is_lower_hex_digits(prepared)
}

fn is_hex(prepared: &str) -> bool {
    !prepared.is_empty() && prepared.len() % 2 == 0 && is_lower_hex_digits(prepared)
}

fn is_lower_hex_digits(value: &str) -> bool {
    value.bytes().all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
}
