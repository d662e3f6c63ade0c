pub mod appointmentdtos;
