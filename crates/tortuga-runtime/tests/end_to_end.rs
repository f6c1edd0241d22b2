//! End-to-end tests: source text → reader → evaluator → observed effects.
//!
//! These drive the full pipeline through an in-memory console and storage,
//! feeding physical lines exactly as the REPL would.

use tortuga_common::errors::ErrorCode;
use tortuga_heap::{Outcome, Value};
use tortuga_reader::ReadSession;
use tortuga_runtime::interp::{Interp, InterpConfig};

/// Feed every line of `source`, returning the outcomes of completed events
/// and the captured console output.
fn run_all(source: &str) -> (Vec<Outcome>, String, Interp) {
    run_all_with(InterpConfig::default(), source, "")
}

fn run_all_with(
    config: InterpConfig,
    source: &str,
    console_input: &str,
) -> (Vec<Outcome>, String, Interp) {
    let (mut it, out, _) = Interp::in_memory_with(config, console_input);
    let outcomes = feed(&mut it, source);
    (outcomes, out.contents(), it)
}

fn feed(it: &mut Interp, source: &str) -> Vec<Outcome> {
    let mut session = ReadSession::new();
    let mut outcomes = Vec::new();
    for line in source.lines() {
        match it.feed_line(&mut session, line) {
            Ok(None) => {}
            Ok(Some(out)) => outcomes.push(out),
            Err(e) => outcomes.push(Outcome::Error(Box::new(e))),
        }
    }
    outcomes
}

/// Source that must run cleanly; returns printed output.
fn run(source: &str) -> String {
    let (outcomes, output, _) = run_all(source);
    for out in &outcomes {
        match out {
            Outcome::None | Outcome::Value(_) => {}
            other => panic!("unexpected outcome {other:?}; output so far: {output:?}"),
        }
    }
    output
}

/// Source whose final event must surface a Logo error.
fn run_expect_error(source: &str) -> tortuga_common::errors::ErrorInfo {
    let (outcomes, _, _) = run_all(source);
    match outcomes.last() {
        Some(Outcome::Error(info)) => (**info).clone(),
        other => panic!("expected an error, got {other:?}"),
    }
}

// ===================================================================
// Printing and arithmetic
// ===================================================================

#[test]
fn test_print_sum_of_variables() {
    // make "x 3 make "y 4 print sum :x :y  =>  7
    let out = run("make \"x 3 make \"y 4 print sum :x :y");
    assert_eq!(out, "7\n");
}

#[test]
fn test_infix_precedence_and_grouping() {
    assert_eq!(run("print 2 + 3 * 4"), "14\n");
    assert_eq!(run("print (1 + 2) * 3"), "9\n");
    assert_eq!(run("print 10 / 4"), "2.5\n");
}

#[test]
fn test_right_associativity() {
    // 10 - 2 - 3 groups as 10 - (2 - 3).
    assert_eq!(run("print 10 - 2 - 3"), "11\n");
}

#[test]
fn test_unary_minus() {
    assert_eq!(run("print -3"), "-3\n");
    assert_eq!(run("print - 3 + 10"), "7\n");
    assert_eq!(run("print minus 5"), "-5\n");
}

#[test]
fn test_comparisons_produce_bool_words() {
    assert_eq!(run("print 1 < 2"), "true\n");
    assert_eq!(run("print 1 > 2"), "false\n");
    assert_eq!(run("print 2 = 2"), "true\n");
    assert_eq!(run("print \"Foo = \"foo"), "true\n");
}

#[test]
fn test_variadic_in_parens() {
    assert_eq!(run("print (sum 1 2 3 4)"), "10\n");
    assert_eq!(run("(print 1 2 3)"), "1 2 3\n");
}

#[test]
fn test_divide_by_zero() {
    let err = run_expect_error("print 1 / 0");
    assert_eq!(err.code, ErrorCode::DivideByZero);
}

#[test]
fn test_number_exponent_forms() {
    assert_eq!(run("print 2e3"), "2000\n");
    assert_eq!(run("print 1n2"), "0.01\n");
}

// ===================================================================
// Top-level expression and error reporting
// ===================================================================

#[test]
fn test_top_level_expression_returns_value() {
    let (outcomes, _, it) = run_all("sum 1 2");
    match outcomes.as_slice() {
        [Outcome::Value(v)] => assert_eq!(v.as_number(&it.heap), Some(3.0)),
        other => panic!("expected value, got {other:?}"),
    }
}

#[test]
fn test_mid_line_value_is_an_error() {
    let err = run_expect_error("sum 1 2 print 3");
    assert_eq!(err.code, ErrorCode::DontKnowWhatToDoWith);
    assert_eq!(err.arg.as_deref(), Some("3"));
}

#[test]
fn test_unknown_procedure() {
    let err = run_expect_error("frobnicate 3");
    assert_eq!(err.code, ErrorCode::DontKnowHow);
    assert_eq!(err.arg.as_deref(), Some("frobnicate"));
}

#[test]
fn test_not_enough_inputs() {
    let err = run_expect_error("print sum 1");
    assert_eq!(err.code, ErrorCode::NotEnoughInputs);
    assert_eq!(err.proc.as_deref(), Some("sum"));
}

#[test]
fn test_unbound_variable() {
    let err = run_expect_error("print :nowhere");
    assert_eq!(err.code, ErrorCode::NoValue);
    assert_eq!(err.arg.as_deref(), Some("nowhere"));
}

#[test]
fn test_stop_at_top_level_surfaces() {
    let (outcomes, _, _) = run_all("stop");
    assert!(matches!(outcomes.as_slice(), [Outcome::Stop]));
}

// ===================================================================
// Procedures: recursion, CPS, TCO
// ===================================================================

#[test]
fn test_factorial_through_nested_calls() {
    let src = "to f :n\n\
               if :n = 0 [output 1]\n\
               output product :n f difference :n 1\n\
               end\n\
               print f 5";
    assert_eq!(run(src), "120\n");
}

#[test]
fn test_tail_recursion_runs_in_constant_frame_space() {
    // A frame takes ten words; an arena this small proves reuse.
    let config = InterpConfig {
        arena_words: 64,
        ..Default::default()
    };
    let src = "to countdown :n\n\
               if :n = 0 [stop]\n\
               countdown difference :n 1\n\
               end\n\
               countdown 10000";
    let (outcomes, _, it) = run_all_with(config, src, "");
    assert!(
        outcomes.iter().all(|o| matches!(o, Outcome::None)),
        "countdown failed: {outcomes:?}"
    );
    // All frames released on completion.
    assert_eq!(it.frames.depth(), 0);
    assert_eq!(it.frames.arena_top(), 0);
}

#[test]
fn test_nested_call_returns_through_resume() {
    let src = "to a\noutput b\nend\n\
               to b\noutput 2\nend\n\
               print a";
    assert_eq!(run(src), "2\n");
}

#[test]
fn test_mutual_recursion() {
    let src = "to even :n\n\
               if :n = 0 [output \"true]\n\
               output odd difference :n 1\n\
               end\n\
               to odd :n\n\
               if :n = 0 [output \"false]\n\
               output even difference :n 1\n\
               end\n\
               print even 10\n\
               print odd 7";
    assert_eq!(run(src), "true\ntrue\n");
}

#[test]
fn test_frame_arena_restored_after_calls() {
    let src = "to noop :x\nend\nnoop 1";
    let (outcomes, _, it) = run_all(src);
    assert!(outcomes.iter().all(|o| matches!(o, Outcome::None)));
    assert_eq!(it.frames.arena_top(), 0);
    assert_eq!(it.frames.depth(), 0);
}

#[test]
fn test_arity_errors_on_user_procedures() {
    let err = run_expect_error("to two :a :b\nend\nprint (two 1 2 3)");
    assert_eq!(err.code, ErrorCode::TooManyInputs);
    let err = run_expect_error("to two :a :b\nend\ntwo 1");
    assert_eq!(err.code, ErrorCode::NotEnoughInputs);
}

#[test]
fn test_error_inside_procedure_records_caller() {
    let err = run_expect_error("to bad\nprint :nowhere\nend\nbad");
    assert_eq!(err.code, ErrorCode::NoValue);
    assert_eq!(err.caller.as_deref(), Some("bad"));
}

#[test]
fn test_output_value_unconsumed_in_caller_is_error() {
    // b outputs into a context that discards values.
    let err = run_expect_error("to b\noutput 2\nend\nto a\nb\nend\na");
    assert_eq!(err.code, ErrorCode::DontKnowWhatToDoWith);
}

#[test]
fn test_procedure_that_doesnt_output_is_error_in_expression() {
    let err = run_expect_error("to quiet\nend\nprint quiet");
    assert_eq!(err.code, ErrorCode::DidntOutput);
    assert_eq!(err.proc.as_deref(), Some("quiet"));
}

// ===================================================================
// Dynamic scope
// ===================================================================

#[test]
fn test_dynamic_scope_callee_sees_caller_locals() {
    let src = "to inner\noutput :x\nend\n\
               to outer :x\noutput inner\nend\n\
               print outer 42";
    assert_eq!(run(src), "42\n");
}

#[test]
fn test_make_rebinds_in_scope_local_stays_local() {
    let src = "make \"x 1\n\
               to touch\nlocal \"x\nmake \"x 99\noutput :x\nend\n\
               print touch\n\
               print :x";
    assert_eq!(run(src), "99\n1\n");
}

#[test]
fn test_make_on_unbound_name_creates_global() {
    let src = "to setter\nmake \"fresh 5\nend\nsetter\nprint :fresh";
    assert_eq!(run(src), "5\n");
}

// ===================================================================
// Lists and words
// ===================================================================

#[test]
fn test_repeat_builds_list() {
    // make "p [] repeat 3 [make "p fput repcount :p] print :p  =>  [3 2 1]
    let out = run("make \"p [] repeat 3 [make \"p fput repcount :p] print :p");
    assert_eq!(out, "[3 2 1]\n");
}

#[test]
fn test_list_operations() {
    assert_eq!(run("print first [a b c]"), "a\n");
    assert_eq!(run("print butfirst [a b c]"), "[b c]\n");
    assert_eq!(run("print last [a b c]"), "c\n");
    assert_eq!(run("print butlast [a b c]"), "[a b]\n");
    assert_eq!(run("print item 2 [a b c]"), "b\n");
    assert_eq!(run("print count [a b c]"), "3\n");
    assert_eq!(run("print lput \"d [a b c]"), "[a b c d]\n");
    assert_eq!(run("print sentence [a b] [c d]"), "[a b c d]\n");
    assert_eq!(run("print (list 1 2 3)"), "[1 2 3]\n");
}

#[test]
fn test_word_operations() {
    assert_eq!(run("print first \"hello"), "h\n");
    assert_eq!(run("print butfirst \"hello"), "ello\n");
    assert_eq!(run("print count \"hello"), "5\n");
    assert_eq!(run("print word \"foo \"bar"), "foobar\n");
}

#[test]
fn test_predicates() {
    assert_eq!(run("print emptyp []"), "true\n");
    assert_eq!(run("print emptyp [a]"), "false\n");
    assert_eq!(run("print numberp 3"), "true\n");
    assert_eq!(run("print numberp \"3"), "true\n");
    assert_eq!(run("print numberp \"x"), "false\n");
    assert_eq!(run("print listp []"), "true\n");
    assert_eq!(run("print wordp \"w"), "true\n");
    assert_eq!(run("print memberp \"b [a b c]"), "true\n");
    assert_eq!(run("print equalp [1 2] [1 2]"), "true\n");
}

#[test]
fn test_nested_list_literals_print_with_brackets() {
    assert_eq!(run("print [a [b c] d]"), "[a [b c] d]\n");
    assert_eq!(run("show [1 2]"), "[1 2]\n");
}

// ===================================================================
// Control flow
// ===================================================================

#[test]
fn test_ifelse_branches() {
    assert_eq!(run("ifelse 1 = 1 [print \"yes] [print \"no]"), "yes\n");
    assert_eq!(run("ifelse 1 = 2 [print \"yes] [print \"no]"), "no\n");
}

#[test]
fn test_if_requires_boolean() {
    let err = run_expect_error("if 3 [print 1]");
    assert_eq!(err.code, ErrorCode::NotBool);
}

#[test]
fn test_test_iftrue_iffalse() {
    let src = "to check :n\n\
               test :n > 10\n\
               iftrue [output \"big]\n\
               iffalse [output \"small]\n\
               end\n\
               print check 20\n\
               print check 5";
    assert_eq!(run(src), "big\nsmall\n");
}

#[test]
fn test_if_as_expression_value() {
    assert_eq!(run("print ifelse 2 > 1 [\"yes] [\"no]"), "yes\n");
}

#[test]
fn test_run_and_runresult() {
    assert_eq!(run("run [print 1]"), "1\n");
    assert_eq!(run("print run [sum 1 2]"), "3\n");
    assert_eq!(run("print runresult [sum 1 2]"), "[3]\n");
    assert_eq!(run("print runresult [print 9]"), "9\n[]\n");
}

#[test]
fn test_repcount_outside_repeat_is_error() {
    let err = run_expect_error("print repcount");
    assert_eq!(err.code, ErrorCode::NotInsideRepeat);
}

#[test]
fn test_goto_label() {
    let src = "to spin :n\n\
               label \"top\n\
               if :n = 0 [stop]\n\
               print :n\n\
               make \"n difference :n 1\n\
               goto \"top\n\
               end\n\
               spin 3";
    assert_eq!(run(src), "3\n2\n1\n");
}

#[test]
fn test_goto_missing_label() {
    let err = run_expect_error("to g\ngoto \"gone\nend\ng");
    assert_eq!(err.code, ErrorCode::CantFindLabel);
}

// ===================================================================
// Catch and throw
// ===================================================================

#[test]
fn test_catch_returns_thrown_value() {
    // catch "err [throw "err "boom]  =>  boom
    let output = run("print catch \"err [throw \"err \"boom]");
    assert_eq!(output, "boom\n");
}

#[test]
fn test_catch_without_value_is_quiet() {
    let (outcomes, output, _) = run_all("catch \"tag [throw \"tag]\nprint \"after");
    assert!(
        outcomes.iter().all(|o| matches!(o, Outcome::None)),
        "{outcomes:?}"
    );
    assert_eq!(output, "after\n");
}

#[test]
fn test_mismatched_tag_propagates() {
    let (outcomes, _, it) = run_all("catch \"other [throw \"tag]");
    match outcomes.as_slice() {
        [Outcome::Throw { tag, .. }] => {
            assert_eq!(it.heap.atom_text(*tag), "tag");
        }
        other => panic!("expected throw, got {other:?}"),
    }
}

#[test]
fn test_catch_error_records_caught_error() {
    let src = "catch \"error [print 1 / 0]\nprint error";
    let (outcomes, output, _) = run_all(src);
    assert!(
        outcomes
            .iter()
            .all(|o| matches!(o, Outcome::None | Outcome::Value(_))),
        "{outcomes:?}"
    );
    assert!(output.contains("12"), "code in {output:?}");
    assert!(output.contains("Can't divide by zero"), "{output:?}");
}

#[test]
fn test_throw_unwinds_frames() {
    let src = "to deep :n\n\
               if :n = 0 [throw \"out]\n\
               deep difference :n 1\n\
               end\n\
               catch \"out [deep 5]\nprint \"done";
    let (outcomes, output, it) = run_all(src);
    assert!(
        outcomes
            .iter()
            .all(|o| matches!(o, Outcome::None | Outcome::Value(_))),
        "{outcomes:?}"
    );
    assert_eq!(output, "done\n");
    assert_eq!(it.frames.depth(), 0);
}

// ===================================================================
// Workspace operations
// ===================================================================

#[test]
fn test_po_round_trips_definition() {
    let src = "to double :n\noutput sum :n :n\nend\npo \"double";
    assert_eq!(run(src), "to double :n\n  output sum :n :n\nend\n");
}

#[test]
fn test_define_and_text_round_trip() {
    let src = "to double :n\noutput sum :n :n\nend\n\
               define \"twice text \"double\n\
               print twice 4";
    assert_eq!(run(src), "8\n");
}

#[test]
fn test_erase_and_redefinition() {
    let src = "to f\noutput 1\nend\n\
               to f\noutput 2\nend\n\
               print f";
    assert_eq!(run(src), "2\n");

    let err = run_expect_error("to f\noutput 1\nend\nerase \"f\nprint f");
    assert_eq!(err.code, ErrorCode::DontKnowHow);
}

#[test]
fn test_defining_over_primitive_is_rejected() {
    let err = run_expect_error("to print :x\nend");
    assert_eq!(err.code, ErrorCode::IsPrimitive);
}

#[test]
fn test_bury_hides_from_poall_and_erall() {
    let src = "to keeper\noutput 1\nend\n\
               to goner\noutput 2\nend\n\
               bury \"keeper\n\
               erall\n\
               print keeper";
    let (outcomes, output, _) = run_all(src);
    // erall throws to toplevel; the REPL absorbs it and keeps going.
    assert!(
        outcomes
            .iter()
            .any(|o| matches!(o, Outcome::Throw { .. })),
        "{outcomes:?}"
    );
    assert_eq!(output, "1\n");
}

#[test]
fn test_trace_output() {
    let src = "to double :n\noutput sum :n :n\nend\n\
               trace \"double\n\
               print double 4";
    let output = run(src);
    assert!(output.contains("( double 4 )"), "{output:?}");
    assert!(output.contains("double outputs 8"), "{output:?}");
    assert!(output.ends_with("8\n"), "{output:?}");
}

#[test]
fn test_property_lists() {
    let src = "pprop \"bird \"wings 2\n\
               print gprop \"bird \"wings\n\
               pprop \"bird \"can \"fly\n\
               print plist \"bird\n\
               remprop \"bird \"wings\n\
               print gprop \"bird \"wings";
    assert_eq!(run(src), "2\n[can fly wings 2]\n[]\n");
}

#[test]
fn test_gprop_returns_numbers_plist_returns_words() {
    let (outcomes, _, it) = run_all("pprop \"e \"n 7\ngprop \"e \"n");
    match outcomes.last() {
        Some(Outcome::Value(v)) => {
            assert_eq!(*v, Value::Number(7.0));
        }
        other => panic!("expected number, got {other:?}"),
    }
    // The stored representation stays a word.
    let plist = it.ws.props.plist(it.heap.find_atom("e").unwrap());
    let value_cell = it.heap.cdr(plist);
    let stored = it.heap.car(value_cell);
    assert!(stored.is_atom());
    assert_eq!(it.heap.atom_text(stored), "7");
}

// ===================================================================
// Heap and GC behaviour
// ===================================================================

#[test]
fn test_recycle_and_nodes() {
    let (outcomes, _, it) = run_all("recycle\nnodes");
    match outcomes.last() {
        Some(Outcome::Value(v)) => {
            let free = v.as_number(&it.heap).unwrap();
            assert!(free > 0.0);
        }
        other => panic!("expected node count, got {other:?}"),
    }
}

#[test]
fn test_gc_reclaims_garbage_under_pressure() {
    let config = InterpConfig {
        node_capacity: 64,
        ..Default::default()
    };
    // Each iteration builds a fresh list and drops the old one.
    let src = "make \"p []\n\
               repeat 200 [make \"p list repcount repcount]";
    let (outcomes, _, _) = run_all_with(config, src, "");
    assert!(
        outcomes.iter().all(|o| matches!(o, Outcome::None)),
        "{outcomes:?}"
    );
}

#[test]
fn test_out_of_space_when_everything_reachable() {
    let config = InterpConfig {
        node_capacity: 48,
        ..Default::default()
    };
    // Grow a rooted list until the pool is exhausted.
    let src = "make \"p []\nrepeat 100 [make \"p fput 1 :p]";
    let (outcomes, _, _) = run_all_with(config, src, "");
    match outcomes.last() {
        Some(Outcome::Error(info)) => assert_eq!(info.code, ErrorCode::OutOfSpace),
        other => panic!("expected out of space, got {other:?}"),
    }
}

#[test]
fn test_interrupt_flag_stops_execution() {
    let (mut it, out, _) = Interp::in_memory("");
    it.io.flags.set_brk();
    let outcomes = feed(&mut it, "print 1");
    match outcomes.as_slice() {
        [Outcome::Error(info)] => assert_eq!(info.code, ErrorCode::Stopped),
        other => panic!("expected Stopped, got {other:?}"),
    }
    assert_eq!(out.contents(), "");
}

// ===================================================================
// Streams
// ===================================================================

#[test]
fn test_write_to_file_and_read_back() {
    let src = "openwrite \"out.txt\n\
               setwrite \"out.txt\n\
               print \"hello \"there\n\
               setwrite []\n\
               close \"out.txt\n\
               openread \"out.txt\n\
               setread \"out.txt\n\
               print readline\n\
               setread []\n\
               close \"out.txt";
    // The file line `hello there` reads back as a two-word list.
    assert_eq!(run(src), "[hello there]\n");
}

#[test]
fn test_readline_eof_returns_empty_list() {
    let src = "openwrite \"empty.txt\nclose \"empty.txt\n\
               openread \"empty.txt\nsetread \"empty.txt\n\
               print readline\n\
               print eofp\n\
               setread []";
    assert_eq!(run(src), "[]\ntrue\n");
}

#[test]
fn test_readchar_from_console() {
    let (outcomes, output, _) = run_all_with(InterpConfig::default(), "print readchar", "Q");
    assert!(
        outcomes.iter().all(|o| matches!(o, Outcome::None)),
        "{outcomes:?}"
    );
    assert_eq!(output, "Q\n");
}

#[test]
fn test_dribble_mirrors_console() {
    let (outcomes, output, it) = run_all(
        "dribble \"log.txt\nprint \"mirrored\nnodribble\nprint \"only",
    );
    assert!(outcomes.iter().all(|o| matches!(o, Outcome::None)));
    assert_eq!(output, "mirrored\nonly\n");
    let _ = it;
}

// ===================================================================
// Save and load
// ===================================================================

#[test]
fn test_save_load_round_trip() {
    let src = "to double :n\noutput sum :n :n\nend\n\
               make \"greeting \"hi\n\
               make \"xs [1 2 3]\n\
               pprop \"bird \"wings 2\n\
               save \"ws.lg";
    let (outcomes, _, mut it) = run_all(src);
    assert!(
        outcomes.iter().all(|o| matches!(o, Outcome::None)),
        "{outcomes:?}"
    );

    // Wipe and reload into the same interpreter.
    it.ws.procs.erase_all();
    it.ws.globals.erase_all();
    it.ws.props.clear();
    let outcomes = feed(&mut it, "load \"ws.lg\nprint double 21\nprint :greeting\nprint :xs\nprint gprop \"bird \"wings");
    for out in &outcomes {
        assert!(
            matches!(out, Outcome::None | Outcome::Value(_)),
            "{out:?}"
        );
    }
}

#[test]
fn test_saved_text_shape() {
    let src = "to double :n\noutput sum :n :n\nend\n\
               make \"greeting \"hi\n\
               save \"ws.lg";
    let (_, _, it) = run_all(src);
    let text = tortuga_runtime::persist::workspace_text(&it);
    assert!(text.contains("to double :n\n  output sum :n :n\nend\n"), "{text:?}");
    assert!(text.contains("make \"greeting \"hi\n"), "{text:?}");
}

#[test]
fn test_load_runs_startup_list() {
    let (mut it, out, storage) = Interp::in_memory("");
    storage.write_file("boot.lg", "make \"startup [print \"booted]\n");
    let outcomes = feed(&mut it, "load \"boot.lg");
    assert!(
        outcomes.iter().all(|o| matches!(o, Outcome::None)),
        "{outcomes:?}"
    );
    assert_eq!(out.contents(), "booted\n");
}

#[test]
fn test_load_aborts_on_first_error() {
    let (mut it, out, storage) = Interp::in_memory("");
    storage.write_file("bad.lg", "print \"one\nfrobnicate\nprint \"two\n");
    let outcomes = feed(&mut it, "load \"bad.lg");
    match outcomes.as_slice() {
        [Outcome::Error(info)] => assert_eq!(info.code, ErrorCode::DontKnowHow),
        other => panic!("expected error, got {other:?}"),
    }
    assert_eq!(out.contents(), "one\n");
}
