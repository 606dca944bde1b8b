use crate::broker::EventStream;
use futures::StreamExt;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

const MERGE_BUFFER: usize = 16;

/// Fans `streams` into a single stream.
///
/// Every input is drained by its own task into one shared channel, so a slow or idle input
/// never holds back the others. Order is kept within an input, not across inputs. The merged
/// stream ends once every input has ended: each forwarder owns a sender and the channel
/// closes when the last one is dropped.
///
/// Must be called from within a tokio runtime.
pub fn merge_streams(streams: Vec<EventStream>) -> EventStream {
    let (merged, received) = mpsc::channel(MERGE_BUFFER);

    for mut stream in streams {
        let merged = merged.clone();
        tokio::spawn(async move {
            while let Some(event) = stream.next().await {
                if merged.send(event).await.is_err() {
                    // Nobody reads the merged stream anymore.
                    break;
                }
            }
        });
    }

    Box::pin(ReceiverStream::new(received))
}
