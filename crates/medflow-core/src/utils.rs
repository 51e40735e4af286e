//! 通用工具函数

use crate::models::DEPARTMENTS;

/// 规范化科室名称，未提供时回落到General
pub fn normalize_department(department: Option<&str>) -> String {
    match department {
        Some(d) if !d.trim().is_empty() => d.trim().to_string(),
        _ => "General".to_string(),
    }
}

/// 是否为内置科室
pub fn is_known_department(department: &str) -> bool {
    DEPARTMENTS.iter().any(|d| *d == department)
}

/// 简单的电话号码校验：7-15位数字，允许前导加号
pub fn is_valid_phone(phone: &str) -> bool {
    let digits = phone.strip_prefix('+').unwrap_or(phone);
    (7..=15).contains(&digits.len()) && digits.chars().all(|c| c.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_department() {
        assert_eq!(normalize_department(Some("Cardiology")), "Cardiology");
        assert_eq!(normalize_department(Some("  ")), "General");
        assert_eq!(normalize_department(None), "General");
    }

    #[test]
    fn test_is_valid_phone() {
        assert!(is_valid_phone("9876543210"));
        assert!(is_valid_phone("+919876543210"));
        assert!(!is_valid_phone("12345"));
        assert!(!is_valid_phone("98-76-54"));
    }
}
