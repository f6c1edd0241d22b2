//! The line-oriented read-eval-print loop.

use tortuga_common::errors::{ErrorCode, ErrorInfo};
use tortuga_heap::Outcome;
use tortuga_reader::{ReadSession, printer};
use tortuga_runtime::Interp;

/// Run the REPL until EOF or `bye`. Returns the process exit code.
pub fn run_repl(it: &mut Interp) -> i32 {
    let mut session = ReadSession::new();
    loop {
        let prompt = if session.is_pending() { "> " } else { "? " };
        it.io.write_console(prompt);
        it.io.flush();

        let line = match it.io.read_console_line() {
            None => return 0,
            Some(Err(())) => {
                report(it, &ErrorInfo::new(ErrorCode::Stopped));
                session.reset();
                continue;
            }
            Some(Ok(line)) => line,
        };

        match it.feed_line(&mut session, &line) {
            Ok(None) => {}
            Ok(Some(out)) => {
                if handle_outcome(it, out) {
                    return 0;
                }
            }
            Err(e) => report(it, &e),
        }
    }
}

/// Surface one completed outcome at the prompt. True means exit.
pub fn handle_outcome(it: &mut Interp, out: Outcome) -> bool {
    match out {
        Outcome::None => {}
        Outcome::Value(v) => {
            let text = printer::value_text(&it.heap, &v);
            it.io.write_console(&text);
            it.io.write_console("\n");
        }
        Outcome::Error(info) => report(it, &info),
        Outcome::Throw { tag, .. } => {
            if tag == it.atoms.toplevel {
                // Restart the prompt, workspace intact.
                it.reset_execution_state();
            } else {
                let text = it.heap.atom_text(tag).to_string();
                report(it, &ErrorInfo::new(ErrorCode::NoCatch).with_arg(text));
            }
        }
        Outcome::Stop => {
            report(it, &ErrorInfo::new(ErrorCode::AtToplevel).with_arg("stop"));
        }
        Outcome::Output(_) => {
            report(it, &ErrorInfo::new(ErrorCode::AtToplevel).with_arg("output"));
        }
        Outcome::Goto { .. } => {
            report(it, &ErrorInfo::new(ErrorCode::AtToplevel).with_arg("goto"));
        }
        Outcome::Interrupted => report(it, &ErrorInfo::new(ErrorCode::Stopped)),
        Outcome::Eof => return true,
        Outcome::Call { .. } => {
            report(it, &ErrorInfo::new(ErrorCode::Fatal));
        }
    }
    false
}

fn report(it: &mut Interp, info: &ErrorInfo) {
    it.io.write_console(&info.render());
    it.io.write_console("\n");
    it.io.flush();
}
