//! Timing knobs recommended by the design (§5, "timeouts"). None of
//! these are wire-visible; they only bound how long the relay waits
//! before giving up on a peer.

use std::time::Duration;

/// How long a freshly-upgraded socket has to send its `start` frame.
pub const START_TIMEOUT: Duration = Duration::from_secs(10);

/// How long an access-client session waits for the agent to answer
/// `initiate_connection` before giving up.
pub const OPEN_WAIT_TIMEOUT: Duration = Duration::from_secs(30);
