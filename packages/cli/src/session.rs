use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use workerbridge_envelope::{Envelope, EnvelopeCodec, JsonCodec, Value};
use workerbridge_host::{
    ChannelSender, ChannelTransport, HostConfig, HostProxy, MemorySurface, ProxyError,
};

use crate::error::CliError;

/// Counters for a finished session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionSummary {
    pub envelopes_in: usize,
    pub envelopes_out: usize,
    pub frames_presented: usize,
}

/// Run one worker session over a pair of byte streams.
///
/// Ends when `input` reaches EOF and all outstanding work is answered. Every
/// host envelope produced before a failure is still written to `output`.
pub async fn run_session<R, W>(
    config: HostConfig,
    input: R,
    mut output: W,
) -> Result<SessionSummary, CliError>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let codec = JsonCodec;
    let surface = MemorySurface::new(config.width, config.height);
    let (host_end, worker_end) = ChannelTransport::bidirectional(config.channel_capacity);
    let (worker_tx, mut worker_rx) = worker_end.into_parts();

    let mut host = HostProxy::new(config, surface, host_end)?;
    host.dispatcher_mut().set_custom_handler(|data: Value| {
        tracing::info!(target: "worker::custom", ?data, "custom message");
    });

    let mut envelopes_out = 0;
    let outcome = {
        let reader = feed(input, worker_tx, codec);
        let session = async {
            tokio::try_join!(reader, async {
                host.run().await.map_err(CliError::from)
            })
        };
        tokio::pin!(session);

        loop {
            tokio::select! {
                result = &mut session => break result,
                Some(envelope) = worker_rx.recv() => {
                    write_envelope(&mut output, &codec, &envelope).await?;
                    envelopes_out += 1;
                }
            }
        }
    };

    while let Ok(envelope) = worker_rx.try_recv() {
        write_envelope(&mut output, &codec, &envelope).await?;
        envelopes_out += 1;
    }
    output.flush().await?;

    let (envelopes_in, ()) = outcome?;
    let summary = SessionSummary {
        envelopes_in,
        envelopes_out,
        frames_presented: host.surface().presented_frames().len(),
    };
    tracing::info!(?summary, "session finished");
    Ok(summary)
}

/// Decode input lines and hand them to the host. Blank lines are skipped.
async fn feed<R>(input: R, worker: ChannelSender, codec: JsonCodec) -> Result<usize, CliError>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = input.lines();
    let mut line_no = 0;
    let mut count = 0;

    while let Some(line) = lines.next_line().await? {
        line_no += 1;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let envelope = codec
            .decode(line.as_bytes())
            .map_err(|error| CliError::Decode {
                line: line_no,
                error,
            })?;
        worker.send_wait(envelope).await?;
        count += 1;
    }

    tracing::debug!(count, "input closed");
    Ok(count)
}

async fn write_envelope<W>(
    output: &mut W,
    codec: &JsonCodec,
    envelope: &Envelope,
) -> Result<(), CliError>
where
    W: AsyncWrite + Unpin,
{
    let mut bytes = codec.encode(envelope).map_err(ProxyError::from)?;
    bytes.push(b'\n');
    output.write_all(&bytes).await?;
    Ok(())
}
