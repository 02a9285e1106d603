//! Configuration validation.
//!
//! Every check runs; all failures are collected into a single
//! `ConfigError::ValidationError`.

mod helpers;


use crate::schema::BabelConfig;
use babel_common::ConfigError;

use helpers::{validate_range, validate_scheme};

/// Run all validations on a config, collecting all errors.
pub fn validate(config: &BabelConfig) -> Result<(), ConfigError> {
    let mut errors: Vec<String> = Vec::new();

    validate_service(&mut errors, config);
    validate_participant(&mut errors, config);
    validate_timeouts(&mut errors, config);

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::ValidationError(errors.join("; ")))
    }
}

fn validate_service(errors: &mut Vec<String>, config: &BabelConfig) {
    let service = &config.service;

    let overrides_both = service.rest_endpoint.is_some() && service.websocket_endpoint.is_some();
    if service.host.trim().is_empty() && !overrides_both {
        errors.push("service.host is empty".into());
    }
    if let Some(url) = &service.rest_endpoint {
        validate_scheme(errors, "service.rest_endpoint", url, &["https", "http"]);
    }
    if let Some(url) = &service.websocket_endpoint {
        validate_scheme(errors, "service.websocket_endpoint", url, &["wss", "ws"]);
    }
    if service.subscription_key.is_some() && service.auth_token.is_some() {
        errors.push("service.subscription_key and service.auth_token are mutually exclusive".into());
    }
}

fn validate_participant(errors: &mut Vec<String>, config: &BabelConfig) {
    let participant = &config.participant;
    if participant.language.trim().is_empty() {
        errors.push("participant.language is empty".into());
    }
    if participant.translate_to.iter().any(|l| l.trim().is_empty()) {
        errors.push("participant.translate_to contains an empty language".into());
    }
}

fn validate_timeouts(errors: &mut Vec<String>, config: &BabelConfig) {
    let t = &config.timeouts;
    validate_range(errors, "timeouts.connect_secs", t.connect_secs, 1, 600);
    validate_range(errors, "timeouts.leave_secs", t.leave_secs, 1, 120);
    validate_range(errors, "timeouts.http_connect_secs", t.http_connect_secs, 1, 120);
    validate_range(errors, "timeouts.http_request_secs", t.http_request_secs, 1, 600);
    validate_range(errors, "timeouts.ping_interval_secs", t.ping_interval_secs, 0, 300);
}
