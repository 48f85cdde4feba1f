//! Utility functions and types

pub mod data_loader;

pub use data_loader::{
    column_to_vec, columns_to_array2, require_columns, split_features_label, take_rows, DataLoader,
};
