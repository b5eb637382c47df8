use crate::utils::error::{AnalysisError, Result};
use url::Url;

pub trait Validate {
    fn validate(&self) -> Result<()>;
}

fn invalid(field: &str, value: impl ToString, reason: impl Into<String>) -> AnalysisError {
    AnalysisError::InvalidConfigValueError {
        field: field.to_string(),
        value: value.to_string(),
        reason: reason.into(),
    }
}

/// GraphQL 端點只接受 http / https
pub fn validate_url(field_name: &str, url_str: &str) -> Result<()> {
    if url_str.trim().is_empty() {
        return Err(invalid(field_name, url_str, "URL cannot be empty"));
    }

    let url = Url::parse(url_str)
        .map_err(|e| invalid(field_name, url_str, format!("Invalid URL format: {}", e)))?;
    match url.scheme() {
        "http" | "https" => Ok(()),
        scheme => Err(invalid(
            field_name,
            url_str,
            format!("Unsupported URL scheme: {}", scheme),
        )),
    }
}

pub fn validate_path(field_name: &str, path: &str) -> Result<()> {
    if path.is_empty() {
        return Err(invalid(field_name, path, "Path cannot be empty"));
    }
    if path.contains('\0') {
        return Err(invalid(field_name, path, "Path contains null bytes"));
    }
    Ok(())
}

pub fn validate_extension(field_name: &str, path: &str, allowed: &[&str]) -> Result<()> {
    let extension = std::path::Path::new(path)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase);

    match extension {
        Some(ext) if allowed.contains(&ext.as_str()) => Ok(()),
        Some(ext) => Err(invalid(
            field_name,
            path,
            format!(
                "Unsupported file extension: {}. Allowed extensions: {}",
                ext,
                allowed.join(", ")
            ),
        )),
        None => Err(invalid(field_name, path, "File has no extension")),
    }
}

pub fn validate_required_field<'a, T>(field_name: &str, value: &'a Option<T>) -> Result<&'a T> {
    value.as_ref().ok_or_else(|| AnalysisError::MissingConfigError {
        field: field_name.to_string(),
    })
}

pub fn validate_non_empty_string(field_name: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(invalid(
            field_name,
            value,
            "Value cannot be empty or whitespace-only",
        ));
    }
    Ok(())
}

pub fn validate_range<T: PartialOrd + std::fmt::Display + Copy>(
    field_name: &str,
    value: T,
    min: T,
    max: T,
) -> Result<()> {
    if value < min || value > max {
        return Err(invalid(
            field_name,
            value,
            format!("Value must be between {} and {}", min, max),
        ));
    }
    Ok(())
}

/// 0x 開頭、40 個十六進位字元
pub fn validate_address(field_name: &str, address: &str) -> Result<()> {
    let is_address = address.len() == 42
        && address.starts_with("0x")
        && address[2..].chars().all(|c| c.is_ascii_hexdigit());
    if !is_address {
        return Err(invalid(
            field_name,
            address,
            "Expected a 0x-prefixed 20-byte hex address",
        ));
    }
    Ok(())
}

/// 驗證時間窗口：開始時間不可晚於結束時間
pub fn validate_time_window(start: Option<i64>, end: Option<i64>) -> Result<()> {
    if let (Some(start), Some(end)) = (start, end) {
        if start > end {
            return Err(invalid(
                "start_time",
                start,
                format!("Start time must not be after end time ({})", end),
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_url() {
        assert!(validate_url("graphql_endpoint", "https://example.com/subgraphs/v3").is_ok());
        assert!(validate_url("graphql_endpoint", "http://localhost:8000").is_ok());
        assert!(validate_url("graphql_endpoint", "").is_err());
        assert!(validate_url("graphql_endpoint", "invalid-url").is_err());
        assert!(validate_url("graphql_endpoint", "ftp://example.com").is_err());
    }

    #[test]
    fn test_validate_range() {
        assert!(validate_range("retry_attempts", 3, 0, 10).is_ok());
        assert!(validate_range("retry_attempts", 11, 0, 10).is_err());
    }

    #[test]
    fn test_validate_extension() {
        assert!(validate_extension("schema", "schema.graphql", &["graphql", "gql"]).is_ok());
        assert!(validate_extension("schema", "dir/Schema.GQL", &["graphql", "gql"]).is_ok());
        assert!(validate_extension("schema", "schema.txt", &["graphql", "gql"]).is_err());
        assert!(validate_extension("schema", "schema", &["graphql"]).is_err());
    }

    #[test]
    fn test_validate_address() {
        assert!(validate_address("pool", "0x88e6a0c2ddd26feeb64f039a2c41296fcb3f5640").is_ok());
        assert!(validate_address("pool", "0x123").is_err());
        assert!(validate_address("pool", "88e6a0c2ddd26feeb64f039a2c41296fcb3f564000").is_err());
    }

    #[test]
    fn test_validate_time_window() {
        assert!(validate_time_window(Some(10), Some(20)).is_ok());
        assert!(validate_time_window(None, Some(20)).is_ok());
        assert!(validate_time_window(Some(30), Some(20)).is_err());
    }
}
