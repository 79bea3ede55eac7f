mod pg_recording_repository_test;
