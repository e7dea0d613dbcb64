//! Fault containment at component boundaries
//!
//! Every public operation runs inside [`contain`]. A panic inside a matcher is
//! caught, logged with enough context to reproduce it (component, input length,
//! input fingerprint) and replaced by the component's safe outcome.

use sha2::{Digest, Sha256};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

/// Truncated SHA-256 of the inputs, hex encoded (16 chars)
pub fn fingerprint(inputs: &[&str]) -> String {
    let mut hasher = Sha256::new();
    for (idx, input) in inputs.iter().enumerate() {
        if idx > 0 {
            hasher.update([0u8]);
        }
        hasher.update(input.as_bytes());
    }
    hex::encode(&hasher.finalize()[..8])
}

/// Run `op`, converting a panic into `fallback()`.
pub fn contain<T>(
    component: &'static str,
    inputs: &[&str],
    fallback: impl FnOnce() -> T,
    op: impl FnOnce() -> T,
) -> T {
    match panic::catch_unwind(AssertUnwindSafe(op)) {
        Ok(value) => value,
        Err(payload) => {
            let input_len: usize = inputs.iter().map(|i| i.len()).sum();
            tracing::error!(
                component,
                input_len,
                input_hash = %fingerprint(inputs),
                fault = %panic_message(payload.as_ref()),
                "internal fault contained"
            );
            fallback()
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
