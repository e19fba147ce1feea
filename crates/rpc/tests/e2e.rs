use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use trackwire_net_codec::{
    ApplicationException, CodecError, ExceptionKind, ProtocolReader, ProtocolWriter, TType, Void,
    WireStruct, memory_pair,
};
use trackwire_net_tracker::{
    CallContext, HandShaker, Hooks, ProtocolVersion, RequestHeader, SimpleTracker, TrackerConfig,
};
use trackwire_rpc::{Processor, RpcClient, RpcError, Service, TcpServer, connect};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("debug")
        .with_test_writer()
        .try_init();
}

fn tracker(client: &str, server: &str, hooks: Hooks) -> Arc<SimpleTracker> {
    Arc::new(SimpleTracker::new(TrackerConfig::new(client, server), hooks))
}

/// What a handler saw of its call context, plus what its downstream saw.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Seen {
    request_id: String,
    seq: String,
    meta_len: i32,
    downstream: Option<Box<Seen>>,
}

impl Seen {
    fn of(ctx: &CallContext) -> Self {
        Self {
            request_id: ctx.request_id().unwrap_or_default().to_string(),
            seq: ctx.sequence().unwrap_or_default().to_string(),
            meta_len: ctx.meta().len() as i32,
            downstream: None,
        }
    }
}

impl WireStruct for Seen {
    fn write(&self, out: &mut ProtocolWriter) -> Result<(), CodecError> {
        out.write_struct_begin("Seen")?;
        out.write_field_begin("request_id", TType::String, 1)?;
        out.write_string(&self.request_id)?;
        out.write_field_end()?;
        out.write_field_begin("seq", TType::String, 2)?;
        out.write_string(&self.seq)?;
        out.write_field_end()?;
        out.write_field_begin("meta_len", TType::I32, 3)?;
        out.write_i32(self.meta_len)?;
        out.write_field_end()?;
        if let Some(downstream) = &self.downstream {
            out.write_field_begin("downstream", TType::Struct, 4)?;
            downstream.write(out)?;
            out.write_field_end()?;
        }
        out.write_field_stop()?;
        out.write_struct_end()
    }

    fn read(input: &mut ProtocolReader) -> Result<Self, CodecError> {
        let mut seen = Self::default();
        input.read_struct_begin()?;
        loop {
            let field = input.read_field_begin()?;
            match (field.id, field.ttype) {
                (_, TType::Stop) => break,
                (1, TType::String) => seen.request_id = input.read_string()?,
                (2, TType::String) => seen.seq = input.read_string()?,
                (3, TType::I32) => seen.meta_len = input.read_i32()?,
                (4, TType::Struct) => seen.downstream = Some(Box::new(Seen::read(input)?)),
                (_, ttype) => input.skip(ttype)?,
            }
            input.read_field_end()?;
        }
        input.read_struct_end()?;
        Ok(seen)
    }
}

fn encode(value: &impl WireStruct) -> Result<ProtocolWriter, ApplicationException> {
    let mut out = ProtocolWriter::new();
    value
        .write(&mut out)
        .map_err(|e| ApplicationException::new(ExceptionKind::InternalError, e.to_string()))?;
    Ok(out)
}

/// Answers `whoami` with the context it was called in.
struct Whoami;

#[async_trait]
impl Service for Whoami {
    async fn call(
        &self,
        ctx: CallContext,
        method: &str,
        args: &mut ProtocolReader,
    ) -> Result<ProtocolWriter, ApplicationException> {
        match method {
            "whoami" => {
                Void::read(args).map_err(|e| {
                    ApplicationException::new(ExceptionKind::ProtocolError, e.to_string())
                })?;
                // The ambient context must match the one handed in.
                assert_eq!(CallContext::current().as_ref(), Some(&ctx));
                encode(&Seen::of(&ctx))
            }
            _ => Err(ApplicationException::unknown_method(method)),
        }
    }
}

/// Answers `relay` by calling `whoami` on the next hop.
struct Relay {
    next: std::net::SocketAddr,
}

#[async_trait]
impl Service for Relay {
    async fn call(
        &self,
        ctx: CallContext,
        method: &str,
        _args: &mut ProtocolReader,
    ) -> Result<ProtocolWriter, ApplicationException> {
        if method != "relay" {
            return Err(ApplicationException::unknown_method(method));
        }
        let internal =
            |e: RpcError| ApplicationException::new(ExceptionKind::InternalError, e.to_string());

        let mut client = connect(self.next, tracker("server-B", "server-C", Hooks::noop()))
            .await
            .map_err(internal)?;
        let downstream: Seen = client.call("whoami", &Void).await.map_err(internal)?;

        let mut seen = Seen::of(&ctx);
        seen.downstream = Some(Box::new(downstream));
        encode(&seen)
    }
}

#[tokio::test]
async fn header_reaches_the_handler_once() {
    init_tracing();

    let received = Arc::new(Mutex::new(Vec::<RequestHeader>::new()));
    let recorded = Arc::clone(&received);
    let server_tracker = tracker(
        "server-A",
        "server-B",
        Hooks::noop().with_on_header_received(move |header| recorded.lock().push(header.clone())),
    );
    let (a, b) = memory_pair();
    let processor = Processor::new(Arc::new(Whoami), server_tracker.clone());
    let server = tokio::spawn(async move { processor.serve(b).await });

    let mut client = RpcClient::new(a, tracker("server-A", "server-B", Hooks::noop()));
    let ctx = CallContext::new().with_meta("k", "v");
    let seen: Seen = client.call_with(&ctx, "whoami", &Void).await.unwrap();

    assert_eq!(client.tracker().version(), ProtocolVersion::RequestHeader);
    assert_eq!(server_tracker.version(), ProtocolVersion::RequestHeader);
    assert_eq!(seen.seq, "1");
    assert!(!seen.request_id.is_empty());
    assert_eq!(seen.meta_len, 1);

    let received = received.lock().clone();
    assert_eq!(received.len(), 1);
    assert_eq!(received[0].request_id, seen.request_id);

    drop(client);
    server.await.unwrap().unwrap();
}

#[tokio::test]
async fn every_call_gets_a_fresh_chain_without_context() {
    let (a, b) = memory_pair();
    let processor = Processor::new(
        Arc::new(Whoami),
        tracker("server-A", "server-B", Hooks::noop()),
    );
    tokio::spawn(async move { processor.serve(b).await });

    let mut client = RpcClient::new(a, tracker("server-A", "server-B", Hooks::noop()));
    let first: Seen = client.call("whoami", &Void).await.unwrap();
    let second: Seen = client.call("whoami", &Void).await.unwrap();

    assert_eq!(first.seq, "1");
    assert_eq!(second.seq, "1");
    assert_ne!(first.request_id, second.request_id);
}

#[tokio::test]
async fn ambient_context_continues_the_chain() {
    let (a, b) = memory_pair();
    let processor = Processor::new(
        Arc::new(Whoami),
        tracker("server-A", "server-B", Hooks::noop()),
    );
    tokio::spawn(async move { processor.serve(b).await });

    let mut client = RpcClient::new(a, tracker("server-A", "server-B", Hooks::noop()));
    let ambient = CallContext::new().with_request_id("req-1").with_sequence("1");
    let seen: Seen = ambient
        .scope(client.call("whoami", &Void))
        .await
        .unwrap();

    assert_eq!(seen.request_id, "req-1");
    assert_eq!(seen.seq, "1.2");
}

#[tokio::test]
async fn legacy_server_is_called_without_headers() {
    init_tracing();

    let (a, b) = memory_pair();
    let processor = Processor::legacy(Arc::new(Whoami));
    tokio::spawn(async move { processor.serve(b).await });

    let mut client = RpcClient::new(a, tracker("server-A", "server-B", Hooks::noop()));
    let ctx = CallContext::new().with_meta("k", "v");
    let seen: Seen = client.call_with(&ctx, "whoami", &Void).await.unwrap();

    assert_eq!(client.tracker().version(), ProtocolVersion::Default);
    assert_eq!(seen, Seen::default());
}

#[tokio::test]
async fn unknown_method_is_a_remote_exception() {
    let (a, b) = memory_pair();
    let processor = Processor::new(
        Arc::new(Whoami),
        tracker("server-A", "server-B", Hooks::noop()),
    );
    tokio::spawn(async move { processor.serve(b).await });

    let mut client = RpcClient::new(a, tracker("server-A", "server-B", Hooks::noop()));
    let result: Result<Void, _> = client.call("divide", &Void).await;
    match result {
        Err(RpcError::Remote(exc)) => assert_eq!(exc.kind(), ExceptionKind::UnknownMethod),
        other => panic!("expected remote exception, got {other:?}"),
    }

    // The connection stays usable.
    let seen: Seen = client.call("whoami", &Void).await.unwrap();
    assert_eq!(seen.seq, "1");
}

#[tokio::test]
async fn failed_negotiation_is_reported_once() {
    let (a, mut b) = memory_pair();
    let server = tokio::spawn(async move {
        use trackwire_net_codec::{MessageChannel, MessageIdentifier, MessageType};

        // Answer the handshake with a foreign exception, then serve normally.
        let mut body = ProtocolReader::new(b.recv().await.unwrap());
        let call = body.read_message_begin().unwrap();
        let mut out = ProtocolWriter::new();
        out.write_message_begin(&MessageIdentifier::new(
            call.name,
            MessageType::Exception,
            call.seq_id,
        ))
        .unwrap();
        ApplicationException::new(ExceptionKind::InternalError, "boom")
            .write(&mut out)
            .unwrap();
        out.write_message_end().unwrap();
        b.send(out.freeze()).await.unwrap();

        Processor::legacy(Arc::new(Whoami)).serve(b).await
    });

    let mut client = RpcClient::new(a, tracker("server-A", "server-B", Hooks::noop()));
    let first: Result<Seen, _> = client.call("whoami", &Void).await;
    assert!(matches!(first, Err(RpcError::Tracker(_))));

    let second: Seen = client.call("whoami", &Void).await.unwrap();
    assert_eq!(second, Seen::default());
    assert_eq!(client.tracker().version(), ProtocolVersion::Default);

    drop(client);
    server.await.unwrap().unwrap();
}

#[tokio::test]
async fn three_hop_chain_over_tcp() {
    init_tracing();

    let c = TcpServer::bind("127.0.0.1:0", Arc::new(Whoami))
        .await
        .unwrap()
        .with_trackers(SimpleTracker::factory(
            TrackerConfig::new("server-B", "server-C"),
            Hooks::noop(),
        ));
    let c_addr = c.local_addr().unwrap();
    tokio::spawn(c.run());

    let b = TcpServer::bind("127.0.0.1:0", Arc::new(Relay { next: c_addr }))
        .await
        .unwrap()
        .with_trackers(SimpleTracker::factory(
            TrackerConfig::new("server-A", "server-B"),
            Hooks::noop(),
        ));
    let b_addr = b.local_addr().unwrap();
    tokio::spawn(b.run());

    let mut client = connect(b_addr, tracker("server-A", "server-B", Hooks::noop()))
        .await
        .unwrap();
    let seen: Seen = client.call("relay", &Void).await.unwrap();

    assert_eq!(seen.seq, "1");
    let downstream = seen.downstream.unwrap();
    assert_eq!(downstream.seq, "1.2");
    assert_eq!(downstream.request_id, seen.request_id);
}

#[tokio::test]
async fn oneway_with_bad_header_gets_no_reply() {
    use trackwire_net_codec::{MessageChannel, MessageIdentifier, MessageType};

    let (mut a, b) = memory_pair();
    let processor = Processor::new(
        Arc::new(Whoami),
        tracker("server-A", "server-B", Hooks::noop()),
    );
    let server = tokio::spawn(async move { processor.serve(b).await });

    let client = tracker("server-A", "server-B", Hooks::noop());
    client.negotiate(1, &mut a).await.unwrap();
    assert_eq!(client.version(), ProtocolVersion::RequestHeader);

    let mut out = ProtocolWriter::new();
    out.write_message_begin(&MessageIdentifier::new("whoami", MessageType::Oneway, 9))
        .unwrap();
    // Field type byte 0x7f is not a valid type.
    out.write_byte(0x7f).unwrap();
    out.write_i16(1).unwrap();
    a.send(out.freeze()).await.unwrap();

    assert!(matches!(
        server.await.unwrap(),
        Err(RpcError::Tracker(_))
    ));
    // The processor hung up without writing anything back.
    assert!(matches!(a.recv().await, Err(CodecError::ConnectionClosed)));
}
