use crate::error::PlatformError;
use crate::models::Position;
use std::sync::Arc;

/// Reads and moves the system pointer.
/// The loops only ever go through this trait, so tests can swap in a fake.
pub trait Pointer: Send + Sync {
    fn position(&self) -> Result<Position, PlatformError>;
    fn move_to(&self, to: Position) -> Result<(), PlatformError>;
}

/// Connects to the pointer backend for the current OS.
pub fn default_pointer() -> Result<Arc<dyn Pointer>, PlatformError> {
    #[cfg(target_os = "macos")]
    {
        Ok(Arc::new(macos::MacPointer))
    }
    #[cfg(target_os = "linux")]
    {
        Ok(Arc::new(x11::X11Pointer::connect()?))
    }
    #[cfg(windows)]
    {
        Ok(Arc::new(win::WinPointer))
    }
    #[cfg(not(any(target_os = "macos", target_os = "linux", windows)))]
    {
        Err(PlatformError::Unsupported)
    }
}

#[cfg(target_os = "macos")]
mod macos {
    use super::Pointer;
    use crate::error::PlatformError;
    use crate::models::Position;
    use core_graphics::event::{CGEvent, CGEventTapLocation, CGEventType, CGMouseButton};
    use core_graphics::event_source::{CGEventSource, CGEventSourceStateID};
    use core_graphics::geometry::CGPoint;

    pub struct MacPointer;

    impl Pointer for MacPointer {
        fn position(&self) -> Result<Position, PlatformError> {
            let source = CGEventSource::new(CGEventSourceStateID::CombinedSessionState)
                .map_err(|_| PlatformError::Query("CGEventSourceCreate failed".into()))?;
            let event = CGEvent::new(source)
                .map_err(|_| PlatformError::Query("CGEventCreate failed".into()))?;
            let loc = event.location();
            Ok(Position::new(loc.x.round() as i32, loc.y.round() as i32))
        }

        fn move_to(&self, to: Position) -> Result<(), PlatformError> {
            // A posted MouseMoved event counts as user input, unlike CGWarpMouseCursorPosition.
            let source = CGEventSource::new(CGEventSourceStateID::HIDSystemState)
                .map_err(|_| PlatformError::Move("CGEventSourceCreate failed".into()))?;
            let point = CGPoint::new(to.x as f64, to.y as f64);
            let event =
                CGEvent::new_mouse_event(source, CGEventType::MouseMoved, point, CGMouseButton::Left)
                    .map_err(|_| PlatformError::Move("CGEventCreateMouseEvent failed".into()))?;
            event.post(CGEventTapLocation::HID);
            Ok(())
        }
    }
}

#[cfg(target_os = "linux")]
mod x11 {
    use super::Pointer;
    use crate::error::PlatformError;
    use crate::models::Position;
    use x11rb::connection::Connection;
    use x11rb::protocol::xproto::{ConnectionExt as _, Window, MOTION_NOTIFY_EVENT};
    use x11rb::protocol::xtest::ConnectionExt as _;
    use x11rb::rust_connection::RustConnection;

    pub struct X11Pointer {
        conn: RustConnection,
        root: Window,
    }

    impl X11Pointer {
        pub fn connect() -> Result<Self, PlatformError> {
            let (conn, screen_num) =
                x11rb::connect(None).map_err(|e| PlatformError::Connect(e.to_string()))?;
            let root = conn
                .setup()
                .roots
                .get(screen_num)
                .map(|screen| screen.root)
                .ok_or_else(|| PlatformError::Connect(format!("screen {} not found", screen_num)))?;
            tracing::debug!(screen = screen_num, "connected to X server");
            Ok(Self { conn, root })
        }
    }

    fn to_coord(v: i32) -> i16 {
        v.clamp(i16::MIN as i32, i16::MAX as i32) as i16
    }

    impl Pointer for X11Pointer {
        fn position(&self) -> Result<Position, PlatformError> {
            let reply = self
                .conn
                .query_pointer(self.root)
                .map_err(|e| PlatformError::Query(e.to_string()))?
                .reply()
                .map_err(|e| PlatformError::Query(e.to_string()))?;
            Ok(Position::new(reply.root_x.into(), reply.root_y.into()))
        }

        fn move_to(&self, to: Position) -> Result<(), PlatformError> {
            // XTEST motion resets the server's idle timer, WarpPointer does not.
            self.conn
                .xtest_fake_input(
                    MOTION_NOTIFY_EVENT,
                    0,
                    x11rb::CURRENT_TIME,
                    self.root,
                    to_coord(to.x),
                    to_coord(to.y),
                    0,
                )
                .map_err(|e| PlatformError::Move(e.to_string()))?
                .check()
                .map_err(|e| PlatformError::Move(e.to_string()))?;
            Ok(())
        }
    }
}

#[cfg(windows)]
mod win {
    use super::Pointer;
    use crate::error::PlatformError;
    use crate::models::Position;
    use windows::Win32::Foundation::POINT;
    use windows::Win32::UI::WindowsAndMessaging::{GetCursorPos, SetCursorPos};

    pub struct WinPointer;

    impl Pointer for WinPointer {
        fn position(&self) -> Result<Position, PlatformError> {
            let mut point = POINT::default();
            unsafe { GetCursorPos(&mut point) }.map_err(|e| PlatformError::Query(e.to_string()))?;
            Ok(Position::new(point.x, point.y))
        }

        fn move_to(&self, to: Position) -> Result<(), PlatformError> {
            unsafe { SetCursorPos(to.x, to.y) }.map_err(|e| PlatformError::Move(e.to_string()))
        }
    }
}
