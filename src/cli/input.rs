// SPDX-License-Identifier: Apache-2.0

use std::io::Read;

use serde::de::DeserializeOwned;

use crate::CliError;

/// Reads `file_path` (or stdin for `-`) and deserializes it as YAML.
/// Non-breaking spaces are normalized the same way a pasted-in CLI dump
/// tends to carry them.
pub(crate) fn yaml_from_file<T: DeserializeOwned>(file_path: &str) -> Result<T, CliError> {
    let mut content = String::new();
    if file_path == "-" {
        std::io::stdin().read_to_string(&mut content)?;
    } else {
        std::fs::File::open(file_path)?.read_to_string(&mut content)?;
    }
    let content = content.replace('\u{A0}', " ");
    Ok(serde_yaml::from_str(&content)?)
}
