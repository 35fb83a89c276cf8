mod http_tests;
mod streamable_tests;
