pub mod auth;

pub use auth::{
    encode_jwt,
    extract_current_customer,
    extract_staff,
    CurrentCustomer,
    CustomerClaims,
    StaffClaims,
};
