//! Integration tests for stream capture.
//!
//! Every test here redirects process-wide descriptors, so they run serially
//! and hold the invocation lock while inspecting stdout/stderr.

mod common;

use std::panic::{self, AssertUnwindSafe};

use common::{std_targets, with_stdout_in_file, ScriptedTool};
use ffembed_av::{exclusive, ChannelKind, Tool};
use serial_test::serial;

#[test]
#[serial]
fn captured_output_interleaves_stdout_and_stderr() {
    let tool = ScriptedTool::new();
    let runner = tool.runner();

    let captured = runner
        .run_ffmpeg_captured(
            &["ffmpeg", "--stdout=one ", "--stderr=two ", "--stdout=three"],
            256,
        )
        .unwrap();

    assert_eq!(captured.exit_code, 0);
    assert_eq!(captured.output, "one two three");
    assert!(!captured.truncated);
    assert_eq!(captured.channel, Some(ChannelKind::TempFile));
}

#[test]
#[serial]
fn captured_output_includes_c_stdio() {
    let tool = ScriptedTool::new();
    let runner = tool.runner();

    let captured = runner
        .run_ffprobe_captured(&["ffprobe", "--c-stdout=ffprobe version n7.1\n"], 256)
        .unwrap();

    assert_eq!(captured.output, "ffprobe version n7.1\n");
}

#[test]
#[serial]
fn output_is_bounded_by_capacity() {
    let tool = ScriptedTool::new();
    let runner = tool.runner();

    let captured = runner
        .run_ffmpeg_captured(&["ffmpeg", "--bulk=10000", "--exit=1"], 64)
        .unwrap();

    assert_eq!(captured.exit_code, 1);
    assert_eq!(captured.output.len(), 63);
    assert!(captured.truncated);
    assert!(captured.output.bytes().all(|b| b == b'x'));
}

#[test]
#[serial]
fn caller_buffer_is_nul_terminated() {
    let tool = ScriptedTool::new();
    let runner = tool.runner();

    for capacity in [1usize, 2, 16, 4096] {
        let mut buffer = vec![0xaau8; capacity];
        let outcome = runner
            .run_captured_into(Tool::Ffmpeg, &["ffmpeg", "--bulk=1000"], &mut buffer)
            .unwrap();

        assert!(outcome.len < capacity, "len {} capacity {}", outcome.len, capacity);
        assert_eq!(buffer[outcome.len], 0);
        assert!(buffer[..outcome.len].iter().all(|&b| b == b'x'));
        assert_eq!(outcome.truncated, capacity <= 1000);
    }
}

#[test]
#[serial]
fn zero_capacity_runs_uncaptured() {
    let _lock = exclusive();
    let tool = ScriptedTool::new();
    let runner = tool.runner();

    let (captured, written) = with_stdout_in_file(|| {
        runner
            .run_ffmpeg_captured(&["ffmpeg", "--stdout=straight through"], 0)
            .unwrap()
    });

    assert_eq!(captured.channel, None);
    assert!(captured.output.is_empty());
    assert_eq!(written, "straight through");
    assert_eq!(tool.resets.load(std::sync::atomic::Ordering::SeqCst), 1);
}

#[test]
#[serial]
fn uncaptured_run_writes_to_real_stdout() {
    let _lock = exclusive();
    let tool = ScriptedTool::new();
    let runner = tool.runner();

    let (exit_code, written) = with_stdout_in_file(|| {
        runner
            .run_ffprobe(&["ffprobe", "--stdout=to the terminal\n"])
            .unwrap()
    });

    assert_eq!(exit_code, 0);
    assert_eq!(written, "to the terminal\n");
}

#[test]
#[serial]
fn descriptors_restored_after_success_and_failure() {
    let _lock = exclusive();
    let tool = ScriptedTool::new();
    let runner = tool.runner();
    let before = std_targets();

    runner
        .run_ffmpeg_captured(&["ffmpeg", "--stdout=fine"], 128)
        .unwrap();
    assert_eq!(std_targets(), before);

    let captured = runner
        .run_ffmpeg_captured(&["ffmpeg", "--stderr=Unrecognized option", "--exit=8"], 128)
        .unwrap();
    assert_eq!(captured.exit_code, 8);
    assert_eq!(captured.output, "Unrecognized option");
    assert_eq!(std_targets(), before);
}

#[test]
#[serial]
fn descriptors_restored_when_tool_panics() {
    let _lock = exclusive();
    let tool = ScriptedTool::new();
    let runner = tool.runner();
    let before = std_targets();

    let result = panic::catch_unwind(AssertUnwindSafe(|| {
        runner.run_ffmpeg_captured(&["ffmpeg", "--stdout=partial", "--panic"], 128)
    }));

    assert!(result.is_err());
    assert_eq!(std_targets(), before);

    // The next run starts clean.
    let captured = runner
        .run_ffmpeg_captured(&["ffmpeg", "--stdout=after panic"], 128)
        .unwrap();
    assert_eq!(captured.output, "after panic");
}

#[test]
#[serial]
fn sequential_captures_do_not_leak() {
    let tool = ScriptedTool::new();
    let runner = tool.runner();

    let first = runner
        .run_ffprobe_captured(&["ffprobe", "--stdout=first call output"], 256)
        .unwrap();
    let second = runner
        .run_ffprobe_captured(&["ffprobe", "--stdout=second"], 256)
        .unwrap();

    assert_eq!(first.output, "first call output");
    assert_eq!(second.output, "second");
}

#[test]
#[serial]
fn reused_buffer_is_overwritten() {
    let tool = ScriptedTool::new();
    let runner = tool.runner();
    let mut buffer = [0u8; 64];

    runner
        .run_captured_into(
            Tool::Ffprobe,
            &["ffprobe", "--stdout=a much longer first message"],
            &mut buffer,
        )
        .unwrap();
    let outcome = runner
        .run_captured_into(Tool::Ffprobe, &["ffprobe", "--stdout=short"], &mut buffer)
        .unwrap();

    assert_eq!(&buffer[..outcome.len], b"short");
    assert_eq!(buffer[outcome.len], 0);
}

#[test]
#[serial]
fn pipe_channel_captures() {
    let _lock = exclusive();
    let tool = ScriptedTool::new();
    let runner = tool.runner().with_channel(ChannelKind::Pipe);
    let before = std_targets();

    let captured = runner
        .run_ffmpeg_captured(&["ffmpeg", "--stdout=via pipe ", "--stderr=and stderr"], 256)
        .unwrap();

    assert_eq!(captured.channel, Some(ChannelKind::Pipe));
    assert_eq!(captured.output, "via pipe and stderr");
    assert_eq!(std_targets(), before);
}

#[test]
#[serial]
fn pipe_channel_never_blocks_on_overflow() {
    let tool = ScriptedTool::new();
    let runner = tool.runner().with_channel(ChannelKind::Pipe);

    // Far more than any default pipe buffer.
    let captured = runner
        .run_ffmpeg_captured(&["ffmpeg", "--bulk=4000000", "--exit=3"], 128)
        .unwrap();

    assert_eq!(captured.exit_code, 3);
    assert_eq!(captured.output.len(), 127);
    assert!(captured.truncated);
}

#[test]
#[serial]
fn pipe_channel_keeps_everything_that_fits() {
    let tool = ScriptedTool::new();
    let runner = tool.runner().with_channel(ChannelKind::Pipe);

    // Larger than a default pipe; the pipe grows or a temp file takes over.
    let captured = runner
        .run_ffmpeg_captured(&["ffmpeg", "--bulk=3000000"], 8_000_000)
        .unwrap();

    assert_eq!(captured.exit_code, 0);
    assert_eq!(captured.output.len(), 3_000_000);
    assert!(!captured.truncated);
    assert!(captured.channel.is_some());
}

#[test]
#[serial]
fn unavailable_channel_runs_uncaptured() {
    let _lock = exclusive();
    let tool = ScriptedTool::new();
    let runner = tool.runner();
    let before = std_targets();

    let (captured, written) = with_stdout_in_file(|| {
        let saved = std::env::var_os("TMPDIR");
        std::env::set_var("TMPDIR", "/nonexistent/ffembed-capture-dir");

        let captured = runner
            .run_ffmpeg_captured(&["ffmpeg", "--stdout=not captured", "--exit=5"], 64)
            .unwrap();

        match saved {
            Some(dir) => std::env::set_var("TMPDIR", dir),
            None => std::env::remove_var("TMPDIR"),
        }
        captured
    });

    assert_eq!(captured.exit_code, 5);
    assert_eq!(captured.channel, None);
    assert!(captured.output.is_empty());
    assert_eq!(written, "not captured");
    assert_eq!(std_targets(), before);
}
