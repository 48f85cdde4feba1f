//! Column layout of the student performance dataset

/// Label column predicted by the regressors
pub const LABEL: &str = "math_score";

/// Numeric feature columns
pub const NUMERIC_FEATURES: [&str; 2] = ["reading_score", "writing_score"];

/// Categorical feature columns
pub const CATEGORICAL_FEATURES: [&str; 5] = [
    "gender",
    "race_ethnicity",
    "parental_level_of_education",
    "lunch",
    "test_preparation_course",
];

/// Name of the numeric branch of the column transformer
pub const NUMERIC_PIPELINE: &str = "numerical_pipeline";

/// Name of the categorical branch of the column transformer
pub const CATEGORICAL_PIPELINE: &str = "categorical_pipeline";

/// Feature columns in the order a single prediction row is assembled
pub fn feature_columns() -> Vec<&'static str> {
    CATEGORICAL_FEATURES
        .iter()
        .chain(NUMERIC_FEATURES.iter())
        .copied()
        .collect()
}

/// Every column the raw dataset must provide
pub fn required_columns() -> Vec<&'static str> {
    let mut columns = feature_columns();
    columns.push(LABEL);
    columns
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_required_columns_end_with_label() {
        let columns = required_columns();
        assert_eq!(columns.len(), 8);
        assert_eq!(columns.last(), Some(&LABEL));
        assert_eq!(columns[0], "gender");
    }
}
