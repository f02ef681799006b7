pub mod attendance;
pub mod core;
pub mod marks;
pub mod students;
pub mod subjects;
pub mod timetable;
pub mod users;
