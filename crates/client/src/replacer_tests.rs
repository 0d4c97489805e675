// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn masks_secret_values() {
    let replacer = Replacer::new(vec!["s3cret".to_string()]);
    assert_eq!(
        replacer.replace("the token is s3cret, use it wisely"),
        "the token is ********, use it wisely"
    );
}

#[test]
fn masks_every_occurrence() {
    let replacer = Replacer::new(vec!["abc123".to_string()]);
    assert_eq!(replacer.replace("abc123 abc123"), "******** ********");
}

#[test]
fn short_values_not_masked() {
    let replacer = Replacer::new(vec!["ab".to_string(), String::new()]);
    assert!(replacer.is_empty());
    assert_eq!(replacer.replace("ab"), "ab");
}

#[test]
fn longer_secrets_mask_first() {
    let replacer = Replacer::new(vec!["user".to_string(), "user:password".to_string()]);
    assert_eq!(
        replacer.replace("login user:password now"),
        "login ******** now"
    );
}

#[test]
fn untouched_lines_pass_through() {
    let replacer = Replacer::new(vec!["s3cret".to_string()]);
    assert_eq!(replacer.replace("nothing to hide"), "nothing to hide");
}
