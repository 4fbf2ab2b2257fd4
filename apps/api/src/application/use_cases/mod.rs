pub mod room_grant;
