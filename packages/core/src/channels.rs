//! Names of the broker lists the worker reads from and writes to.

use sha1::{Digest, Sha1};

use crate::job::JobId;

/// Prefix of the list jobs are popped from.
pub const INPUT_PREFIX: &str = "xrender-in";

/// Prefix of the per-job lists results are pushed to.
pub const OUTPUT_PREFIX: &str = "xrender-out";

/// Input list for a deployment: `xrender-in-<sha1(private_key)>`.
///
/// Each deployment gets its own unguessable namespace while producers and
/// workers that share the key agree on the name.
pub fn input_list(private_key: &str) -> String {
    let digest = Sha1::digest(private_key.as_bytes());
    format!("{INPUT_PREFIX}-{digest:x}")
}

/// Output list for a job: `xrender-out-<job_id>`.
pub fn output_list(job_id: &JobId) -> String {
    format!("{OUTPUT_PREFIX}-{job_id}")
}
