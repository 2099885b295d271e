pub mod directory;

pub use directory::{
    DirectoryError, DoctorDirectory, InMemoryDoctorDirectory, SupabaseDoctorDirectory,
};
