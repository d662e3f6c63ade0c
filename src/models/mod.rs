pub mod appointmentmodel;
pub mod propertymodel;
pub mod usermodel;
