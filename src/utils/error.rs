use thiserror::Error;

/// Feltaxonomi för kärnlagret.
///
/// Repositories och statistikmotorn returnerar alltid typade fel;
/// presentationslagret översätter till användarmeddelanden.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Databasfel: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO-fel: {0}")]
    Io(#[from] std::io::Error),

    /// Unikhetsbrott vid skrivning (namn eller nyckelkombination upptagen)
    #[error("Redan registrerad: {0}")]
    DuplicateName(String),

    /// Främmande nyckel pekar på en rad som saknas eller är raderad
    #[error("Referens saknas: {0}")]
    ReferenceNotFound(String),

    /// Värde utanför tillåtet intervall
    #[error("Värde utanför intervall: {0}")]
    ValueOutOfRange(String),

    /// Radering blockerad av aktiva beroende poster
    #[error("Beroende poster finns: {0}")]
    DependentRecordsExist(String),

    /// Statistikoperation med för få datapunkter
    #[error("Otillräckligt dataunderlag: {0}")]
    InsufficientData(String),

    /// Felformaterad inmatning, fångad innan repository-lagret
    #[error("Valideringsfel: {0}")]
    Validation(String),

    #[error("Hittades inte: {0}")]
    NotFound(String),

    #[error("{0}")]
    Other(String),
}

impl AppError {
    pub fn duplicate(msg: impl Into<String>) -> Self {
        Self::DuplicateName(msg.into())
    }

    pub fn reference_not_found(msg: impl Into<String>) -> Self {
        Self::ReferenceNotFound(msg.into())
    }

    pub fn out_of_range(msg: impl Into<String>) -> Self {
        Self::ValueOutOfRange(msg.into())
    }

    pub fn dependents(msg: impl Into<String>) -> Self {
        Self::DependentRecordsExist(msg.into())
    }

    pub fn insufficient(msg: impl Into<String>) -> Self {
        Self::InsufficientData(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }
}

pub type AppResult<T> = Result<T, AppError>;

/// Översätt ett SQLite-constraintfel till ett domänfel.
///
/// `context` blir del av meddelandet, t.ex. det namn eller den
/// nyckelkombination som orsakade brottet.
pub fn translate_constraint(err: rusqlite::Error, context: &str) -> AppError {
    let msg = err.to_string();

    if msg.contains("UNIQUE constraint failed") {
        AppError::DuplicateName(context.to_string())
    } else if msg.contains("FOREIGN KEY constraint failed") {
        AppError::ReferenceNotFound(context.to_string())
    } else if msg.contains("CHECK constraint failed") {
        AppError::ValueOutOfRange(context.to_string())
    } else {
        AppError::Database(err)
    }
}

/// Som `translate_constraint`, men främmande nyckel-brott vid radering
/// betyder att aktiva barnposter blockerar.
pub fn translate_delete_constraint(err: rusqlite::Error, context: &str) -> AppError {
    let msg = err.to_string();

    if msg.contains("FOREIGN KEY constraint failed") {
        AppError::DependentRecordsExist(context.to_string())
    } else {
        AppError::Database(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sqlite_err(msg: &str) -> rusqlite::Error {
        rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_CONSTRAINT),
            Some(msg.to_string()),
        )
    }

    #[test]
    fn test_translate_unique() {
        let err = translate_constraint(
            sqlite_err("UNIQUE constraint failed: parent_sites.name"),
            "Skogen A",
        );
        assert!(matches!(err, AppError::DuplicateName(_)));
    }

    #[test]
    fn test_translate_foreign_key() {
        let err = translate_constraint(sqlite_err("FOREIGN KEY constraint failed"), "art 17");
        assert!(matches!(err, AppError::ReferenceNotFound(_)));
    }

    #[test]
    fn test_translate_check() {
        let err = translate_constraint(
            sqlite_err("CHECK constraint failed: latitude"),
            "latitud 123",
        );
        assert!(matches!(err, AppError::ValueOutOfRange(_)));
    }

    #[test]
    fn test_delete_foreign_key_means_dependents() {
        let err =
            translate_delete_constraint(sqlite_err("FOREIGN KEY constraint failed"), "Skogen A");
        assert!(matches!(err, AppError::DependentRecordsExist(_)));
    }
}
