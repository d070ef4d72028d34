pub mod affine;
pub mod std;
pub mod vector;
