//! Connection-scoped state shared with the codec system.

use crate::version::ServerVersion;
use crate::zone::ZoneId;
use std::sync::OnceLock;
use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::Arc;

/// Policy for `0000-00-00` dates, which MySQL transmits literally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ZeroDateOption {
    /// Decode zero dates as SQL NULL.
    #[default]
    UseNull,
    /// Round zero dates to the first representable value (`0001-01-01`).
    UseRound,
    /// Fail the decode with an error.
    Exception,
}

/// Mutable connection-scoped state.
///
/// The server-status word is updated by the connection's I/O task from
/// every completion frame and read synchronously by the connection; it is
/// the single shared word between the two.
#[derive(Debug)]
pub struct ConnectionContext {
    server_version: ServerVersion,
    capabilities: u32,
    server_status: Arc<AtomicU16>,
    server_zone: OnceLock<ZoneId>,
    client_zone: ZoneId,
    preserve_instants: bool,
    tiny_int_as_boolean: bool,
    zero_date: ZeroDateOption,
    default_charset: u8,
}

impl ConnectionContext {
    /// Create the context for a logged-in session.
    ///
    /// `server_zone` carries a configured zone override; leaving it unset
    /// requests discovery from the init query.
    pub fn new(
        server_version: ServerVersion,
        capabilities: u32,
        initial_status: u16,
        server_zone: Option<ZoneId>,
    ) -> Self {
        let zone = OnceLock::new();
        if let Some(z) = server_zone {
            let _ = zone.set(z);
        }

        Self {
            server_version,
            capabilities,
            server_status: Arc::new(AtomicU16::new(initial_status)),
            server_zone: zone,
            client_zone: ZoneId::system_default(),
            preserve_instants: true,
            tiny_int_as_boolean: true,
            zero_date: ZeroDateOption::default(),
            default_charset: crate::protocol::charset::DEFAULT_CHARSET,
        }
    }

    /// Override the codec-facing knobs from configuration.
    pub fn with_codec_options(
        mut self,
        client_zone: ZoneId,
        preserve_instants: bool,
        tiny_int_as_boolean: bool,
        zero_date: ZeroDateOption,
        default_charset: u8,
    ) -> Self {
        self.client_zone = client_zone;
        self.preserve_instants = preserve_instants;
        self.tiny_int_as_boolean = tiny_int_as_boolean;
        self.zero_date = zero_date;
        self.default_charset = default_charset;
        self
    }

    /// The server version reported at handshake.
    pub fn server_version(&self) -> &ServerVersion {
        &self.server_version
    }

    /// The negotiated capability flags.
    pub fn capabilities(&self) -> u32 {
        self.capabilities
    }

    /// Whether the server accepts multi-statement exchanges.
    pub fn is_multi_statements_allowed(&self) -> bool {
        self.capabilities & crate::protocol::capabilities::CLIENT_MULTI_STATEMENTS != 0
    }

    /// The shared server-status word, for the I/O task to update.
    pub fn status_word(&self) -> Arc<AtomicU16> {
        Arc::clone(&self.server_status)
    }

    /// The server-status bits from the latest completion frame.
    pub fn server_statuses(&self) -> u16 {
        self.server_status.load(Ordering::Acquire)
    }

    /// Whether the zone must still be discovered by the init query.
    pub fn should_discover_zone(&self) -> bool {
        self.server_zone.get().is_none()
    }

    /// Adopt the zone resolved by the init query. Later calls are ignored.
    pub fn set_server_zone(&self, zone: ZoneId) {
        let _ = self.server_zone.set(zone);
    }

    /// The effective server zone; UTC until discovery completes.
    pub fn server_zone(&self) -> ZoneId {
        self.server_zone.get().copied().unwrap_or_else(ZoneId::utc)
    }

    /// Build the immutable view handed to every codec call.
    pub fn codec_context(&self) -> CodecContext {
        CodecContext {
            server_zone: self.server_zone(),
            client_zone: self.client_zone,
            preserve_instants: self.preserve_instants,
            tiny_int_as_boolean: self.tiny_int_as_boolean,
            zero_date: self.zero_date,
            default_charset: self.default_charset,
            server_version: self.server_version.clone(),
        }
    }
}

/// Immutable view the codecs consume.
#[derive(Debug, Clone)]
pub struct CodecContext {
    /// The server's effective zone, used to interpret naive DATETIME values.
    pub server_zone: ZoneId,
    /// The client-side zone, used when instants are not preserved.
    pub client_zone: ZoneId,
    /// Whether zoned values keep their instant through the server zone.
    pub preserve_instants: bool,
    /// Whether TINYINT(1) decodes to a boolean.
    pub tiny_int_as_boolean: bool,
    /// Zero-date handling policy.
    pub zero_date: ZeroDateOption,
    /// Default charset for encoded strings.
    pub default_charset: u8,
    /// The server version, for codecs with version-dependent forms.
    pub server_version: ServerVersion,
}

impl CodecContext {
    /// The zone instants are reconciled through.
    pub fn instant_zone(&self) -> ZoneId {
        if self.preserve_instants {
            self.server_zone
        } else {
            self.client_zone
        }
    }
}
