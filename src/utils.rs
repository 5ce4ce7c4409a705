// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

pub mod path;

/// Breadcrumb trail attached to parse errors, type errors and auth-scheme diagnostics.
pub fn format_path(path: &[String]) -> String {
    path.join(" -> ")
}
