pub mod m2;
pub mod skin;
