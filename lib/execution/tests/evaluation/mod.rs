mod join;
mod lifecycle;
mod mock_source;
