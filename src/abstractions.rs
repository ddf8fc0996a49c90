pub(crate) mod take_cell;
