//! The default tracker: one negotiated version per connection, request
//! headers only.

use std::sync::Arc;

use async_trait::async_trait;
use metrics::counter;
use tracing::{debug, warn};
use trackwire_net_codec::{
    ApplicationException, ExceptionKind, MessageChannel, MessageIdentifier, MessageType,
    ProtocolReader, ProtocolWriter, WireStruct,
};

use crate::{
    CallContext, HandShaker, Hooks, NegotiatedVersion, ProtocolVersion, RequestHeader,
    TRACKING_API_NAME, Tracker, TrackerConfig, TrackerError, UpgradeArgs, UpgradeReply,
};

/// Tracker for a single connection.
#[derive(Debug)]
pub struct SimpleTracker {
    version: NegotiatedVersion,
    config: TrackerConfig,
    hooks: Hooks,
}

impl SimpleTracker {
    pub fn new(config: TrackerConfig, hooks: Hooks) -> Self {
        Self {
            version: NegotiatedVersion::default(),
            config,
            hooks,
        }
    }

    /// A constructor producing a fresh tracker for every new connection.
    pub fn factory(
        config: TrackerConfig,
        hooks: Hooks,
    ) -> impl Fn() -> Arc<dyn Tracker> + Send + Sync + 'static {
        move || -> Arc<dyn Tracker> {
            Arc::new(SimpleTracker::new(config.clone(), hooks.clone()))
        }
    }

    async fn read_upgrade_reply(
        &self,
        seq_id: i32,
        channel: &mut dyn MessageChannel,
    ) -> Result<Option<UpgradeReply>, TrackerError> {
        let mut input = ProtocolReader::new(channel.recv().await?);
        let reply = input.read_message_begin()?;
        if reply.name != TRACKING_API_NAME {
            return Err(TrackerError::WrongMethodName(reply.name));
        }
        if reply.seq_id != seq_id {
            return Err(TrackerError::BadSequenceId {
                expected: seq_id,
                actual: reply.seq_id,
            });
        }
        match reply.kind {
            MessageType::Reply => {
                let body = UpgradeReply::read(&mut input)?;
                input.read_message_end()?;
                Ok(Some(body))
            }
            MessageType::Exception => {
                let exc = ApplicationException::read(&mut input)?;
                input.read_message_end()?;
                if exc.kind() == ExceptionKind::UnknownMethod {
                    return Ok(None);
                }
                Err(TrackerError::Remote(exc))
            }
            kind => Err(TrackerError::InvalidMessageType(kind)),
        }
    }

    async fn reply_protocol_error(
        &self,
        call: &MessageIdentifier,
        error: &TrackerError,
        channel: &mut dyn MessageChannel,
    ) -> Result<(), TrackerError> {
        let mut out = ProtocolWriter::new();
        out.write_message_begin(&MessageIdentifier::new(
            TRACKING_API_NAME,
            MessageType::Exception,
            call.seq_id,
        ))?;
        error.to_application_exception().write(&mut out)?;
        out.write_message_end()?;
        channel.send(out.freeze()).await?;
        Ok(())
    }
}

#[async_trait]
impl HandShaker for SimpleTracker {
    async fn negotiate(
        &self,
        seq_id: i32,
        channel: &mut dyn MessageChannel,
    ) -> Result<(), TrackerError> {
        let args = UpgradeArgs {
            app_id: self.config.client.clone(),
            version: self.config.proposed_version.as_i32(),
        };
        let mut out = ProtocolWriter::new();
        out.write_message_begin(&MessageIdentifier::new(
            TRACKING_API_NAME,
            MessageType::Call,
            seq_id,
        ))?;
        args.write(&mut out)?;
        out.write_message_end()?;
        debug!(
            client = %self.config.client,
            server = %self.config.server,
            proposed = args.version,
            "Sending tracker handshake"
        );
        channel.send(out.freeze()).await?;

        match self.read_upgrade_reply(seq_id, channel).await {
            Ok(Some(reply)) => {
                let version = self
                    .version
                    .try_set(reply.version, ProtocolVersion::RequestHeader);
                debug!(
                    server = %self.config.server,
                    offered = reply.version,
                    %version,
                    "Tracker negotiated"
                );
                counter!("tracker_negotiations_total", "outcome" => "upgraded").increment(1);
                Ok(())
            }
            Ok(None) => {
                debug!(
                    server = %self.config.server,
                    "Peer does not support tracking, continuing without headers"
                );
                counter!("tracker_negotiations_total", "outcome" => "legacy_peer").increment(1);
                Ok(())
            }
            Err(e) => {
                warn!(server = %self.config.server, error = %e, "Tracker negotiation failed");
                counter!("tracker_negotiations_total", "outcome" => "failed").increment(1);
                Err(e)
            }
        }
    }

    async fn try_upgrade(
        &self,
        call: &MessageIdentifier,
        body: &mut ProtocolReader,
        channel: &mut dyn MessageChannel,
    ) -> Result<bool, TrackerError> {
        if call.name != TRACKING_API_NAME {
            return Ok(false);
        }

        let args = match UpgradeArgs::read(body).and_then(|args| {
            body.read_message_end()?;
            Ok(args)
        }) {
            Ok(args) => args,
            Err(e) => {
                let error = TrackerError::from(e);
                warn!(error = %error, "Malformed tracker handshake");
                if call.kind != MessageType::Oneway {
                    self.reply_protocol_error(call, &error, channel).await?;
                }
                return Err(error);
            }
        };

        self.hooks.handshake_request(&args);
        let version = self
            .version
            .try_set(args.version, ProtocolVersion::RequestHeader);
        debug!(app_id = %args.app_id, proposed = args.version, %version, "Tracker upgrade");
        counter!("tracker_upgrades_total", "version" => version.to_string()).increment(1);
        // Oneway messages never get an answer.
        if call.kind == MessageType::Oneway {
            return Ok(true);
        }

        let mut out = ProtocolWriter::new();
        out.write_message_begin(&MessageIdentifier::new(
            TRACKING_API_NAME,
            MessageType::Reply,
            call.seq_id,
        ))?;
        UpgradeReply {
            version: version.as_i32(),
        }
        .write(&mut out)?;
        out.write_message_end()?;
        channel.send(out.freeze()).await?;
        Ok(true)
    }

    fn version(&self) -> ProtocolVersion {
        self.version.get()
    }
}

impl Tracker for SimpleTracker {
    fn try_read_request_header(
        &self,
        body: &mut ProtocolReader,
    ) -> Result<Option<RequestHeader>, TrackerError> {
        if !self.request_header_supported() {
            return Ok(None);
        }
        let header = RequestHeader::read(body)?;
        counter!("tracker_request_headers_total", "direction" => "inbound").increment(1);
        self.hooks.header_received(&header);
        Ok(Some(header))
    }

    fn try_write_request_header(
        &self,
        ctx: &CallContext,
        out: &mut ProtocolWriter,
    ) -> Result<(), TrackerError> {
        if !self.request_header_supported() {
            return Ok(());
        }
        RequestHeader::for_call(ctx).write(out)?;
        counter!("tracker_request_headers_total", "direction" => "outbound").increment(1);
        Ok(())
    }
}
