pub mod opensees;
