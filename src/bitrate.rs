//! Maximum streaming bitrate policy.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::api::MediaServer;
use crate::error::Result;

/// Ceiling used for `Max` and for clamping probe results (360 Mbit/s).
pub const MAX_BITRATE: i64 = 360_000_000;

/// Floor for probe results so a slow probe never asks for unwatchable quality.
pub const MIN_AUTO_BITRATE: i64 = 1_500_000;

/// Default payload size for the bitrate probe, in bytes.
pub const DEFAULT_BITRATE_TEST_SIZE: u64 = 1_000_000;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaybackBitrate {
    /// Measure the connection and use 80% of it.
    Auto,
    #[default]
    Max,
    /// Fixed ceiling in bits/s.
    Fixed(i64),
}

impl PlaybackBitrate {
    /// Resolve the policy to a bitrate in bits/s. Only `Auto` touches the network.
    pub async fn resolve(&self, server: &dyn MediaServer, test_size: u64) -> Result<i64> {
        match *self {
            PlaybackBitrate::Max => Ok(MAX_BITRATE),
            PlaybackBitrate::Fixed(bitrate) => Ok(bitrate),
            PlaybackBitrate::Auto => {
                let measured = server.bitrate_test(test_size).await?;
                let bitrate = auto_bitrate(measured);
                info!(measured, bitrate, "resolved automatic bitrate");
                Ok(bitrate)
            }
        }
    }
}

pub(crate) fn auto_bitrate(measured: i64) -> i64 {
    (measured.saturating_mul(8) / 10).clamp(MIN_AUTO_BITRATE, MAX_BITRATE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::fixtures::FakeServer;

    #[test]
    fn test_auto_bitrate_clamps() {
        assert_eq!(auto_bitrate(10_000_000), 8_000_000);
        assert_eq!(auto_bitrate(100), MIN_AUTO_BITRATE);
        assert_eq!(auto_bitrate(i64::MAX), MAX_BITRATE);
    }

    #[tokio::test]
    async fn test_resolve_policies() {
        let server = FakeServer::new();
        server.set_bitrate_test_result(20_000_000);

        assert_eq!(PlaybackBitrate::Max.resolve(&server, 100).await.unwrap(), MAX_BITRATE);
        assert_eq!(PlaybackBitrate::Fixed(4_000_000).resolve(&server, 100).await.unwrap(), 4_000_000);
        assert_eq!(server.bitrate_test_count(), 0);

        assert_eq!(PlaybackBitrate::Auto.resolve(&server, 100).await.unwrap(), 16_000_000);
        assert_eq!(server.bitrate_test_count(), 1);
    }

    #[test]
    fn test_toml_representation() {
        #[derive(Deserialize)]
        struct Wrapper {
            bitrate: PlaybackBitrate,
        }
        let w: Wrapper = toml::from_str("bitrate = \"auto\"").unwrap();
        assert_eq!(w.bitrate, PlaybackBitrate::Auto);
        let w: Wrapper = toml::from_str("bitrate = { fixed = 8000000 }").unwrap();
        assert_eq!(w.bitrate, PlaybackBitrate::Fixed(8_000_000));
    }
}
