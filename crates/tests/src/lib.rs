#[cfg(test)]
mod testing_tool;
