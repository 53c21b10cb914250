//! Optional call-stack capture.

/// Frames kept in a crash diagnostic.
pub const MAX_FRAMES: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StackCapture {
    /// One textual frame per entry, innermost first.
    Frames(Vec<String>),
    /// Stack introspection is not available on this platform or build.
    Unsupported,
}

/// Capture up to `max_frames` frames of the current thread's stack.
///
/// Symbolization allocates and takes a lock, so from a signal handler this
/// is strictly best effort.
pub fn capture_stack(max_frames: usize) -> StackCapture {
    #[cfg(target_env = "gnu")]
    {
        use std::backtrace::{Backtrace, BacktraceStatus};

        let backtrace = Backtrace::force_capture();
        if backtrace.status() != BacktraceStatus::Captured {
            return StackCapture::Unsupported;
        }
        let frames = frame_lines(&backtrace.to_string(), max_frames);
        if frames.is_empty() {
            StackCapture::Unsupported
        } else {
            StackCapture::Frames(frames)
        }
    }

    #[cfg(not(target_env = "gnu"))]
    {
        let _ = max_frames;
        StackCapture::Unsupported
    }
}

/// Fold a rendered backtrace into one line per frame.
///
/// Frame headers look like `  3: symbol`; the `at file:line` lines that
/// follow are attached to the frame they belong to.
#[cfg_attr(not(target_env = "gnu"), allow(dead_code))]
fn frame_lines(rendered: &str, max_frames: usize) -> Vec<String> {
    let mut frames: Vec<String> = Vec::new();
    for line in rendered.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if is_frame_header(trimmed) {
            if frames.len() == max_frames {
                break;
            }
            frames.push(trimmed.to_string());
        } else if let Some(last) = frames.last_mut() {
            last.push(' ');
            last.push_str(trimmed);
        }
    }
    frames
}

fn is_frame_header(line: &str) -> bool {
    match line.split_once(':') {
        Some((index, _)) => !index.is_empty() && index.bytes().all(|b| b.is_ascii_digit()),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RENDERED: &str = "   0: scriptward_guard::stack::capture_stack
             at ./src/stack.rs:22:25
   1: scriptward_guard::handler::on_fatal_signal
             at ./src/handler.rs:80:11
   2: <unknown>
   3: main
";

    #[test]
    fn test_frames_attach_locations() {
        let frames = frame_lines(RENDERED, MAX_FRAMES);
        assert_eq!(frames.len(), 4);
        assert_eq!(
            frames[0],
            "0: scriptward_guard::stack::capture_stack at ./src/stack.rs:22:25"
        );
        assert_eq!(frames[2], "2: <unknown>");
    }

    #[test]
    fn test_frames_are_capped() {
        let frames = frame_lines(RENDERED, 2);
        assert_eq!(frames.len(), 2);
        assert!(frames[1].starts_with("1: scriptward_guard::handler::on_fatal_signal"));
    }

    #[test]
    fn test_location_lines_are_not_headers() {
        assert!(!is_frame_header("at ./src/stack.rs:22:25"));
        assert!(is_frame_header("12: main"));
    }

    #[test]
    fn test_capture_never_exceeds_limit() {
        match capture_stack(3) {
            StackCapture::Frames(frames) => assert!(!frames.is_empty() && frames.len() <= 3),
            StackCapture::Unsupported => {}
        }
    }
}
