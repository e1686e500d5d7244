mod comment_extraction_tests;
