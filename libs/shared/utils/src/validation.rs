use shared_models::error::AppError;

pub const MIN_PASSWORD_LENGTH: usize = 6;

/// Fails on the first blank field, naming it.
pub fn require_fields(fields: &[(&str, &str)]) -> Result<(), AppError> {
    match fields.iter().find(|(_, value)| value.trim().is_empty()) {
        Some((name, _)) => Err(AppError::ValidationError(format!("O campo '{}' é obrigatório", name))),
        None => Ok(()),
    }
}

pub fn validate_password(password: &str, confirmation: &str) -> Result<(), AppError> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(AppError::ValidationError(format!(
            "A senha deve ter pelo menos {} caracteres",
            MIN_PASSWORD_LENGTH
        )));
    }
    if password != confirmation {
        return Err(AppError::ValidationError("As senhas não coincidem".to_string()));
    }
    Ok(())
}

pub fn validate_email(email: &str) -> Result<(), AppError> {
    let trimmed = email.trim();
    let valid = trimmed
        .split_once('@')
        .map(|(local, domain)| !local.is_empty() && domain.contains('.') && !domain.starts_with('.'))
        .unwrap_or(false);

    if valid {
        Ok(())
    } else {
        Err(AppError::ValidationError(format!("E-mail inválido: {}", trimmed)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn password_rules() {
        assert!(validate_password("segredo", "segredo").is_ok());
        assert_matches!(validate_password("abc", "abc"), Err(AppError::ValidationError(msg)) if msg.contains("6"));
        assert_matches!(validate_password("segredo", "segredo!"), Err(AppError::ValidationError(msg)) if msg.contains("coincidem"));
    }

    #[test]
    fn required_fields_name_the_missing_one() {
        assert!(require_fields(&[("nome", "Ana"), ("email", "a@b.com")]).is_ok());
        assert_matches!(
            require_fields(&[("nome", "Ana"), ("email", "  ")]),
            Err(AppError::ValidationError(msg)) if msg.contains("email")
        );
    }

    #[test]
    fn email_shape() {
        assert!(validate_email("ana@clinica.com.br").is_ok());
        assert!(validate_email("ana@clinica").is_err());
        assert!(validate_email("@clinica.com").is_err());
    }
}
