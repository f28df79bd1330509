use common::error::AppError;

/// Validate a pasted text body against the size cap.
pub fn validate_text(body: &str, max_bytes: usize) -> Result<(), AppError> {
    if body.trim().is_empty() {
        return Err(AppError::Validation("text body is empty".into()));
    }
    if body.len() > max_bytes {
        return Err(AppError::Validation(format!(
            "text body is {} bytes, above the {} byte cap",
            body.len(),
            max_bytes
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_text_within_the_cap() {
        assert!(validate_text("short body", 1000).is_ok());
    }

    #[test]
    fn rejects_empty_and_oversized_text() {
        assert!(matches!(
            validate_text("   ", 1000),
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            validate_text("toolong", 3),
            Err(AppError::Validation(_))
        ));
    }
}
