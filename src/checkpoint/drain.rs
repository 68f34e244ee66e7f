//! Destructive drain with field-by-field verification.

use std::io::Write;

use crate::config::types::{DrainMismatch, Result};
use crate::kernel::msgque::{self, Message, QueueId};
use crate::report::TapReporter;

/// Drain the queue message-by-message, comparing each against `expected`,
/// then destroy it.
///
/// The drain stops when the kernel reports no message available; that is the
/// normal completion signal, not an error. The queue is destroyed afterward
/// regardless of the comparison outcome, and a destroy failure never masks
/// an earlier comparison failure. One assertion is emitted per receive and
/// per field comparison, so a divergence is localized in the TAP stream as
/// well as in the returned error.
pub fn verify_and_destroy<W: Write>(
    report: &mut TapReporter<W>,
    id: QueueId,
    expected: &[Message],
) -> Result<()> {
    let drained = drain_and_compare(report, id, expected);

    let destroyed = match msgque::remove(id) {
        Ok(()) => {
            report.ok("destroyed queue");
            Ok(())
        }
        Err(e) => {
            report.not_ok(&format!("destroy queue: {e}"));
            Err(e)
        }
    };

    drained.and(destroyed)
}

fn drain_and_compare<W: Write>(
    report: &mut TapReporter<W>,
    id: QueueId,
    expected: &[Message],
) -> Result<()> {
    let mut drained = 0usize;
    loop {
        let message = match msgque::receive(id) {
            Ok(Some(message)) => message,
            Ok(None) => break,
            Err(e) => {
                report.not_ok(&format!("receive message {drained}: {e}"));
                return Err(e);
            }
        };
        report.ok(&format!("drained message {drained}"));

        if let Some(want) = expected.get(drained) {
            if message.size() != want.size() {
                report.not_ok(&format!(
                    "message {drained} size: expected {}, got {}",
                    want.size(),
                    message.size()
                ));
                return Err(DrainMismatch::Size {
                    index: drained,
                    expected: want.size(),
                    actual: message.size(),
                }
                .into());
            }
            report.ok(&format!("message {drained} size matches"));

            if message.mtype() != want.mtype() {
                report.not_ok(&format!(
                    "message {drained} type: expected {}, got {}",
                    want.mtype(),
                    message.mtype()
                ));
                return Err(DrainMismatch::Type {
                    index: drained,
                    expected: want.mtype(),
                    actual: message.mtype(),
                }
                .into());
            }
            report.ok(&format!("message {drained} type matches"));

            if message.payload() != want.payload() {
                report.not_ok(&format!("message {drained} content differs"));
                return Err(DrainMismatch::Content { index: drained }.into());
            }
            report.ok(&format!("message {drained} content matches"));
        }

        drained += 1;
    }

    if drained != expected.len() {
        report.not_ok(&format!(
            "message count: expected {}, got {drained}",
            expected.len()
        ));
        return Err(DrainMismatch::Count {
            expected: expected.len(),
            actual: drained,
        }
        .into());
    }
    report.ok("message count matches");
    Ok(())
}
