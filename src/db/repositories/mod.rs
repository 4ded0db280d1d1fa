pub mod attendance_repository;
pub mod facility_repository;
pub mod occupancy_repository;
pub mod student_repository;
