//! Output suppression for native solver libraries
//!
//! Native backends print license banners and progress logs straight to the process
//! stdout/stderr. Networks solved in parallel share one pair of `gag` redirections: the
//! first caller creates them, later callers reuse them, and the streams come back once the
//! last [`SilencedOutput`] is dropped.
//!
//! `gag` refuses to create a second redirection of a stream that is already redirected, so
//! the live pair is tracked through a weak reference.

use gag::Gag;
use lazy_static::lazy_static;
use std::io;
use std::sync::{Arc, Mutex, Weak};

struct Redirection {
    _stdout: Gag,
    _stderr: Gag,
}

/// Keeps stdout and stderr silenced while alive.
pub struct SilencedOutput {
    _redirection: Arc<Redirection>,
}

lazy_static! {
    static ref ACTIVE: Mutex<Weak<Redirection>> = Mutex::new(Weak::new());
}

/// Silence stdout and stderr, sharing the redirection with other live handles.
pub fn suppress_output() -> io::Result<SilencedOutput> {
    let mut active = ACTIVE
        .lock()
        .map_err(|_| io::Error::other("output suppression lock poisoned"))?;

    if let Some(redirection) = active.upgrade() {
        return Ok(SilencedOutput {
            _redirection: redirection,
        });
    }

    let redirection = Arc::new(Redirection {
        _stdout: Gag::stdout()?,
        _stderr: Gag::stderr()?,
    });
    *active = Arc::downgrade(&redirection);

    Ok(SilencedOutput {
        _redirection: redirection,
    })
}
