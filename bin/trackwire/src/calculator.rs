//! The demo calculator service and its payloads.

use std::{net::SocketAddr, sync::Arc};

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::Mutex as AsyncMutex;
use tracing::info;
use trackwire_net_codec::{
    ApplicationException, CodecError, ExceptionKind, ProtocolReader, ProtocolWriter, TType, Void,
    WireStruct,
};
use trackwire_net_tracker::{CallContext, Hooks, SimpleTracker, TrackerConfig};
use trackwire_rpc::{RpcClient, RpcError, Service, TcpChannel, connect};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct AddArgs {
    pub(crate) num1: i32,
    pub(crate) num2: i32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct AddResult {
    pub(crate) success: i32,
}

impl WireStruct for AddArgs {
    fn write(&self, out: &mut ProtocolWriter) -> Result<(), CodecError> {
        out.write_struct_begin("add_args")?;
        out.write_field_begin("num1", TType::I32, 1)?;
        out.write_i32(self.num1)?;
        out.write_field_end()?;
        out.write_field_begin("num2", TType::I32, 2)?;
        out.write_i32(self.num2)?;
        out.write_field_end()?;
        out.write_field_stop()?;
        out.write_struct_end()
    }

    fn read(input: &mut ProtocolReader) -> Result<Self, CodecError> {
        let mut args = Self::default();
        input.read_struct_begin()?;
        loop {
            let field = input.read_field_begin()?;
            match (field.id, field.ttype) {
                (_, TType::Stop) => break,
                (1, TType::I32) => args.num1 = input.read_i32()?,
                (2, TType::I32) => args.num2 = input.read_i32()?,
                (_, ttype) => input.skip(ttype)?,
            }
            input.read_field_end()?;
        }
        input.read_struct_end()?;
        Ok(args)
    }
}

impl WireStruct for AddResult {
    fn write(&self, out: &mut ProtocolWriter) -> Result<(), CodecError> {
        out.write_struct_begin("add_result")?;
        out.write_field_begin("success", TType::I32, 0)?;
        out.write_i32(self.success)?;
        out.write_field_end()?;
        out.write_field_stop()?;
        out.write_struct_end()
    }

    fn read(input: &mut ProtocolReader) -> Result<Self, CodecError> {
        let mut result = None;
        input.read_struct_begin()?;
        loop {
            let field = input.read_field_begin()?;
            match (field.id, field.ttype) {
                (_, TType::Stop) => break,
                (0, TType::I32) => result = Some(input.read_i32()?),
                (_, ttype) => input.skip(ttype)?,
            }
            input.read_field_end()?;
        }
        input.read_struct_end()?;
        Ok(Self {
            success: result.ok_or(CodecError::MissingField("success"))?,
        })
    }
}

/// A call as seen by one calculator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Observed {
    pub(crate) server: String,
    pub(crate) method: String,
    pub(crate) ctx: CallContext,
}

/// The next calculator a call is forwarded to before answering.
#[derive(Debug, Clone)]
pub(crate) struct Downstream {
    pub(crate) addr: SocketAddr,
    pub(crate) tracker: TrackerConfig,
}

/// Calculator answering `ping` and `add`.
#[derive(Default)]
pub(crate) struct Calculator {
    name: String,
    downstream: Option<Downstream>,
    /// Connection to `downstream`, opened by the first forwarded call.
    client: AsyncMutex<Option<RpcClient<TcpChannel>>>,
    journal: Option<Arc<Mutex<Vec<Observed>>>>,
}

impl Calculator {
    pub(crate) fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub(crate) fn with_downstream(mut self, downstream: Downstream) -> Self {
        self.downstream = Some(downstream);
        self
    }

    pub(crate) fn with_journal(mut self, journal: Arc<Mutex<Vec<Observed>>>) -> Self {
        self.journal = Some(journal);
        self
    }

    /// Repeat the call on the downstream calculator, tagged with this one's name.
    async fn forward<A, R>(
        &self,
        ctx: &CallContext,
        method: &str,
        args: &A,
    ) -> Result<Option<R>, RpcError>
    where
        A: WireStruct + Sync,
        R: WireStruct,
    {
        let Some(downstream) = &self.downstream else {
            return Ok(None);
        };
        let mut ctx = ctx.clone();
        ctx.merge_meta([(self.name.as_str(), method)]);

        let mut slot = self.client.lock().await;
        let client = match slot.take() {
            Some(client) => client,
            None => {
                let tracker =
                    Arc::new(SimpleTracker::new(downstream.tracker.clone(), Hooks::default()));
                connect(downstream.addr, tracker).await?
            }
        };
        let client = slot.insert(client);

        let result = client.call_with(&ctx, method, args).await;
        if let Err(e) = &result
            && !matches!(e, RpcError::Remote(_))
        {
            // The connection state is unknown; reconnect on the next call.
            *slot = None;
        }
        result.map(Some)
    }
}

fn internal(error: impl ToString) -> ApplicationException {
    ApplicationException::new(ExceptionKind::InternalError, error.to_string())
}

fn protocol(error: CodecError) -> ApplicationException {
    ApplicationException::new(ExceptionKind::ProtocolError, error.to_string())
}

fn encode(value: &impl WireStruct) -> Result<ProtocolWriter, ApplicationException> {
    let mut out = ProtocolWriter::new();
    value.write(&mut out).map_err(internal)?;
    Ok(out)
}

#[async_trait]
impl Service for Calculator {
    async fn call(
        &self,
        ctx: CallContext,
        method: &str,
        args: &mut ProtocolReader,
    ) -> Result<ProtocolWriter, ApplicationException> {
        info!(
            server = %self.name,
            method,
            request_id = ctx.request_id().unwrap_or("-"),
            seq = ctx.sequence().unwrap_or("-"),
            meta = ?ctx.meta(),
            "Handling call"
        );
        if let Some(journal) = &self.journal {
            journal.lock().push(Observed {
                server: self.name.clone(),
                method: method.to_string(),
                ctx: ctx.clone(),
            });
        }

        match method {
            "ping" => {
                Void::read(args).map_err(protocol)?;
                self.forward::<_, Void>(&ctx, method, &Void)
                    .await
                    .map_err(internal)?;
                encode(&Void)
            }
            "add" => {
                let add = AddArgs::read(args).map_err(protocol)?;
                if let Some(result) = self
                    .forward::<_, AddResult>(&ctx, method, &add)
                    .await
                    .map_err(internal)?
                {
                    return encode(&result);
                }
                let success = add
                    .num1
                    .checked_add(add.num2)
                    .ok_or_else(|| internal("integer overflow"))?;
                encode(&AddResult { success })
            }
            _ => Err(ApplicationException::unknown_method(method)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trackwire_net_codec::memory_pair;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use trackwire_rpc::{Processor, TcpServer};

    fn tracker() -> Arc<SimpleTracker> {
        Arc::new(SimpleTracker::new(TrackerConfig::new("client", "calculator"), Hooks::noop()))
    }

    #[tokio::test]
    async fn test_add_and_ping() {
        let journal = Arc::new(Mutex::new(Vec::new()));
        let calculator = Calculator::new("calculator").with_journal(Arc::clone(&journal));
        let (a, b) = memory_pair();
        let processor = Processor::new(Arc::new(calculator), tracker());
        tokio::spawn(async move { processor.serve(b).await });

        let mut client = RpcClient::new(a, tracker());
        let _: Void = client.call("ping", &Void).await.unwrap();
        let sum: AddResult = client
            .call("add", &AddArgs { num1: 1, num2: 2 })
            .await
            .unwrap();
        assert_eq!(sum.success, 3);

        let journal = journal.lock();
        assert_eq!(journal.len(), 2);
        assert!(journal.iter().all(|seen| seen.ctx.sequence() == Some("1")));
    }

    #[tokio::test]
    async fn test_overflow_is_an_exception() {
        let (a, b) = memory_pair();
        let processor = Processor::new(Arc::new(Calculator::new("calculator")), tracker());
        tokio::spawn(async move { processor.serve(b).await });

        let mut client = RpcClient::new(a, tracker());
        let result: Result<AddResult, _> = client
            .call("add", &AddArgs { num1: i32::MAX, num2: 1 })
            .await;
        match result {
            Err(RpcError::Remote(exc)) => assert_eq!(exc.kind(), ExceptionKind::InternalError),
            other => panic!("expected remote exception, got {other:?}"),
        }
    }

    #[test]
    fn test_missing_result_field() {
        let mut out = ProtocolWriter::new();
        Void.write(&mut out).unwrap();
        let err = AddResult::read(&mut ProtocolReader::new(out.freeze())).unwrap_err();
        assert!(matches!(err, CodecError::MissingField("success")));
    }

    #[tokio::test]
    async fn test_downstream_connection_is_reused() {
        let handshakes = Arc::new(AtomicUsize::new(0));
        let counted = Arc::clone(&handshakes);
        let journal = Arc::new(Mutex::new(Vec::new()));

        let calculator = Calculator::new("server-C").with_journal(Arc::clone(&journal));
        let c = TcpServer::bind("127.0.0.1:0", Arc::new(calculator))
            .await
            .unwrap()
            .with_trackers(SimpleTracker::factory(
                TrackerConfig::new("server-B", "server-C"),
                Hooks::noop().with_on_handshake_request(move |_| {
                    counted.fetch_add(1, Ordering::SeqCst);
                }),
            ));
        let c_addr = c.local_addr().unwrap();
        tokio::spawn(c.run());

        let b = Calculator::new("server-B").with_downstream(Downstream {
            addr: c_addr,
            tracker: TrackerConfig::new("server-B", "server-C"),
        });
        let (a, b_end) = memory_pair();
        let processor = Processor::new(Arc::new(b), tracker());
        tokio::spawn(async move { processor.serve(b_end).await });

        let mut client = RpcClient::new(a, tracker());
        for _ in 0..3 {
            let _: Void = client.call("ping", &Void).await.unwrap();
        }
        let sum: AddResult = client
            .call("add", &AddArgs { num1: 2, num2: 3 })
            .await
            .unwrap();
        assert_eq!(sum.success, 5);

        assert_eq!(handshakes.load(Ordering::SeqCst), 1);
        let journal = journal.lock();
        assert_eq!(journal.len(), 4);
        assert!(journal.iter().all(|seen| seen.ctx.sequence() == Some("1.2")));
        assert!(journal.iter().all(|seen| seen.ctx.meta().contains_key("server-B")));
    }
}
